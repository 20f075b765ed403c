use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use sekretarz_agent::context::load_note_documents;
use sekretarz_core::config::AppConfig;
use sekretarz_db::{CsvRecordRepository, RecordRepository};

use crate::bootstrap::{async_runtime, load_config, GlobalArgs};
use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["data_file_readable", "reports_dir_writable", "notes_dir_readable", "llm_credentials"];

pub fn run(global: &GlobalArgs, json_output: bool) -> CommandResult {
    let report = build_report(global);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(global: &GlobalArgs) -> DoctorReport {
    let mut checks = Vec::new();

    match load_config(global) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_data_file(&config));
            checks.push(check_reports_dir(&config));
            checks.push(check_notes_dir(&config));
            checks.push(check_llm_credentials(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| {
                DoctorCheck::skipped(name, "skipped because configuration did not load")
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_data_file(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "data_file_readable";
    let path = &config.knowledge.data_path;

    if !path.exists() {
        let parent_ok = path
            .parent()
            .map(|parent| parent.as_os_str().is_empty() || parent.is_dir())
            .unwrap_or(true);
        return if parent_ok {
            DoctorCheck::pass(NAME, format!("`{}` not created yet; first record creates it", path.display()))
        } else {
            DoctorCheck::fail(NAME, format!("parent directory of `{}` does not exist", path.display()))
        };
    }

    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return DoctorCheck::fail(NAME, error.to_string()),
    };
    let repository = CsvRecordRepository::new(path);
    match runtime.block_on(repository.load_all()) {
        Ok(records) => {
            DoctorCheck::pass(NAME, format!("read {} records from `{}`", records.len(), path.display()))
        }
        Err(error) => DoctorCheck::fail(NAME, error.to_string()),
    }
}

fn check_reports_dir(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "reports_dir_writable";
    if !config.agent.report_tool_enabled {
        return DoctorCheck::skipped(NAME, "report tool disabled");
    }

    match ensure_writable(&config.agent.reports_dir) {
        Ok(()) => DoctorCheck::pass(
            NAME,
            format!("`{}` accepts new files", config.agent.reports_dir.display()),
        ),
        Err(error) => DoctorCheck::fail(
            NAME,
            format!("`{}` is not writable: {error}", config.agent.reports_dir.display()),
        ),
    }
}

fn ensure_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let scratch = NamedTempFile::new_in(dir)?;
    scratch.close()
}

fn check_notes_dir(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "notes_dir_readable";
    let Some(dir) = &config.knowledge.notes_dir else {
        return DoctorCheck::skipped(NAME, "knowledge.notes_dir not configured");
    };

    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return DoctorCheck::fail(NAME, error.to_string()),
    };
    match runtime.block_on(load_note_documents(dir)) {
        Ok(notes) => DoctorCheck::pass(NAME, format!("{} notes in `{}`", notes.len(), dir.display())),
        Err(error) => DoctorCheck::fail(NAME, error.to_string()),
    }
}

/// A missing key already fails `config_validation`, so this only reports what will be used.
fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "llm_credentials";
    let provider = config.llm.provider;
    let endpoint = config.llm.effective_base_url();

    if provider.requires_api_key() {
        DoctorCheck::pass(NAME, format!("api key configured for {provider:?} at {endpoint}"))
    } else {
        DoctorCheck::pass(NAME, format!("{provider:?} needs no api key ({endpoint})"))
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
