use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;

use sekretarz_core::config::AppConfig;

use crate::bootstrap::{load_config, GlobalArgs};
use crate::commands::CommandResult;

const COMMAND: &str = "config";

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match load_config(global) {
        Ok(config) => config,
        Err(error) => return error.into_result(COMMAND),
    };

    let config_file_path = global.config.clone().or_else(detect_config_path);
    let sources = Sources {
        global,
        doc: load_config_file_doc(config_file_path.as_deref()),
        path: config_file_path.as_deref(),
    };

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for (key_path, value, env_keys) in entries(&config) {
        lines.push(render_line(key_path, &value, sources.of(key_path, env_keys)));
    }

    CommandResult::text(lines.join("\n"))
}

type Entry = (&'static str, String, &'static [&'static str]);

fn entry(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    (key_path, value, env_keys)
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let knowledge = &config.knowledge;
    let llm = &config.llm;
    let agent = &config.agent;
    let api_key = llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        entry(
            "knowledge.data_path",
            knowledge.data_path.display().to_string(),
            &["SEKRETARZ_KNOWLEDGE_DATA_PATH"],
        ),
        entry(
            "knowledge.notes_dir",
            knowledge
                .notes_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
            &["SEKRETARZ_KNOWLEDGE_NOTES_DIR"],
        ),
        entry("knowledge.top_k", knowledge.top_k.to_string(), &["SEKRETARZ_KNOWLEDGE_TOP_K"]),
        entry(
            "knowledge.relevance_threshold",
            knowledge.relevance_threshold.to_string(),
            &["SEKRETARZ_KNOWLEDGE_RELEVANCE_THRESHOLD"],
        ),
        entry(
            "knowledge.embedding_dimensions",
            knowledge.embedding_dimensions.to_string(),
            &["SEKRETARZ_KNOWLEDGE_EMBEDDING_DIMENSIONS"],
        ),
        entry("llm.provider", format!("{:?}", llm.provider), &["SEKRETARZ_LLM_PROVIDER"]),
        entry("llm.model", llm.model.clone(), &["SEKRETARZ_LLM_MODEL"]),
        entry("llm.base_url", llm.effective_base_url().to_string(), &["SEKRETARZ_LLM_BASE_URL"]),
        entry("llm.api_key", api_key, &["SEKRETARZ_LLM_API_KEY", "GROQ_API_KEY"]),
        entry("llm.timeout_secs", llm.timeout_secs.to_string(), &["SEKRETARZ_LLM_TIMEOUT_SECS"]),
        entry("llm.max_retries", llm.max_retries.to_string(), &["SEKRETARZ_LLM_MAX_RETRIES"]),
        entry("llm.temperature", llm.temperature.to_string(), &["SEKRETARZ_LLM_TEMPERATURE"]),
        entry("agent.language", format!("{:?}", agent.language), &["SEKRETARZ_AGENT_LANGUAGE"]),
        entry("agent.grounding", format!("{:?}", agent.grounding), &["SEKRETARZ_AGENT_GROUNDING"]),
        entry(
            "agent.memory_token_limit",
            agent.memory_token_limit.to_string(),
            &["SEKRETARZ_AGENT_MEMORY_TOKEN_LIMIT"],
        ),
        entry(
            "agent.max_tool_iterations",
            agent.max_tool_iterations.to_string(),
            &["SEKRETARZ_AGENT_MAX_TOOL_ITERATIONS"],
        ),
        entry(
            "agent.report_tool_enabled",
            agent.report_tool_enabled.to_string(),
            &["SEKRETARZ_AGENT_REPORT_TOOL_ENABLED"],
        ),
        entry(
            "agent.reports_dir",
            agent.reports_dir.display().to_string(),
            &["SEKRETARZ_AGENT_REPORTS_DIR"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["SEKRETARZ_LOGGING_LEVEL", "SEKRETARZ_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SEKRETARZ_LOGGING_FORMAT", "SEKRETARZ_LOG_FORMAT"],
        ),
    ]
}

struct Sources<'a> {
    global: &'a GlobalArgs,
    doc: Option<Value>,
    path: Option<&'a Path>,
}

impl Sources<'_> {
    fn of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(flag) = self.global.override_flag(key_path) {
            return format!("flag ({flag})");
        }

        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("sekretarz.toml"), PathBuf::from("config/sekretarz.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('_') {
        if prefix.len() <= 4 {
            return format!("{prefix}_***");
        }
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_key};

    #[test]
    fn redaction_keeps_only_a_short_prefix() {
        assert_eq!(redact_key("gsk_abcdef123456"), "gsk_***");
        assert_eq!(redact_key("sk-proj-abcdef"), "<redacted>");
        assert_eq!(redact_key("averylongprefix_secret"), "<redacted>");
        assert_eq!(redact_key("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[knowledge]\ntop_k = 3\n".parse().expect("toml");
        assert!(contains_path(&doc, "knowledge.top_k"));
        assert!(!contains_path(&doc, "knowledge.notes_dir"));
        assert!(!contains_path(&doc, "llm.model"));
    }
}
