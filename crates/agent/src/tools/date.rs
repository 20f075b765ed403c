use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolDescriptor, ToolError, ToolOutput, DATE_TOOL_NAME};
use crate::guardrails::ToolCapability;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Returns today's date. Input is ignored.
pub struct DateTool {
    descriptor: ToolDescriptor,
    fixed: Option<NaiveDate>,
}

impl DateTool {
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: DATE_TOOL_NAME,
                description: "Zwraca dzisiejszą datę w formacie RRRR-MM-DD. Użyj tego narzędzia \
                    tylko wtedy, gdy pytanie dotyczy dzisiejszej daty lub bieżącego dnia."
                    .to_string(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            fixed: None,
        }
    }

    /// Clock pinned to `date`, for deterministic sessions.
    pub fn fixed(date: NaiveDate) -> Self {
        Self { fixed: Some(date), ..Self::new() }
    }

    fn today(&self) -> NaiveDate {
        self.fixed.unwrap_or_else(|| Local::now().date_naive())
    }
}

impl Default for DateTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DateTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Clock
    }

    async fn execute(&self, _ctx: &ToolContext, _input: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::Answer(self.today().format(DATE_FORMAT).to_string()))
    }
}
