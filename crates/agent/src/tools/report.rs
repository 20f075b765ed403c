use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use sekretarz_core::config::Language;

use super::{Tool, ToolContext, ToolDescriptor, ToolError, ToolOutput, REPORT_TOOL_NAME};
use crate::guardrails::ToolCapability;
use crate::prompts::language_pack;

/// Writes model-produced content into the reports directory.
pub struct ReportTool {
    descriptor: ToolDescriptor,
    reports_dir: PathBuf,
    language: Language,
}

impl ReportTool {
    pub fn new(reports_dir: impl Into<PathBuf>, language: Language) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: REPORT_TOOL_NAME,
                description: "Zapisuje raport do pliku w katalogu raportów. Używaj WYŁĄCZNIE po \
                    tym, jak treść raportu została przygotowana przez inne narzędzie; nigdy do \
                    wyszukiwania informacji."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "filename": {
                            "type": "string",
                            "description": "Nazwa pliku bez katalogów, np. raport_acme.md"
                        },
                        "content": { "type": "string", "description": "Treść raportu" }
                    },
                    "required": ["filename", "content"]
                }),
            },
            reports_dir: reports_dir.into(),
            language,
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }
}

/// A bare file name: no separators, no parent references, not absolute.
pub fn validate_filename(filename: &str) -> Result<&str, ToolError> {
    let trimmed = filename.trim();
    let invalid = trimmed.is_empty()
        || trimmed.contains(['/', '\\'])
        || trimmed.contains("..")
        || Path::new(trimmed).is_absolute()
        || trimmed.chars().any(char::is_control);

    if invalid {
        return Err(ToolError::InvalidFilename(filename.to_string()));
    }
    Ok(trimmed)
}

#[async_trait]
impl Tool for ReportTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::FileWrite
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput, ToolError> {
        let filename = input
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("`filename` must be a string".to_string()))?;
        let content = input
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("`content` must be a string".to_string()))?;
        let filename = validate_filename(filename)?;

        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|source| ToolError::Io { path: self.reports_dir.clone(), source })?;
        let path = self.reports_dir.join(filename);
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| ToolError::Io { path: path.clone(), source })?;

        tracing::info!(
            event_name = "tool.report.written",
            path = %path.display(),
            bytes = content.len(),
            "report written"
        );

        let prefix = language_pack(self.language).report_saved;
        Ok(ToolOutput::Answer(format!("{prefix}: {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use sekretarz_core::config::Language;

    use super::{validate_filename, ReportTool};
    use crate::tools::{Tool, ToolContext, ToolError, ToolOutput};

    #[test]
    fn filenames_must_stay_inside_the_reports_dir() {
        assert_eq!(validate_filename(" raport.md ").expect("valid"), "raport.md");
        for bad in ["", "   ", "../x.md", "sub/x.md", "sub\\x.md", "/etc/passwd", "a..b"] {
            assert!(
                matches!(validate_filename(bad), Err(ToolError::InvalidFilename(_))),
                "`{bad}` should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn writes_content_and_confirms() {
        let dir = TempDir::new().expect("tempdir");
        let reports = dir.path().join("reports");
        let tool = ReportTool::new(&reports, Language::English);

        let output = tool
            .execute(
                &ToolContext::default(),
                json!({ "filename": "acme.md", "content": "# Acme\n- zadanie" }),
            )
            .await
            .expect("write");

        let written = std::fs::read_to_string(reports.join("acme.md")).expect("read back");
        assert_eq!(written, "# Acme\n- zadanie");
        assert!(matches!(output, ToolOutput::Answer(ref text) if text.starts_with("Report saved: ")));
    }

    #[tokio::test]
    async fn traversal_is_a_tool_error_and_writes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let tool = ReportTool::new(dir.path().join("reports"), Language::Polish);

        let error = tool
            .execute(&ToolContext::default(), json!({ "filename": "../evil.md", "content": "x" }))
            .await
            .expect_err("should fail");

        assert!(matches!(error, ToolError::InvalidFilename(_)));
        assert!(!dir.path().join("evil.md").exists());
        assert!(!dir.path().join("reports").exists());
    }
}
