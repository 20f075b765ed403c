use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use sekretarz_core::config::{GroundingMode, Language};

use super::{Tool, ToolContext, ToolDescriptor, ToolError, ToolOutput, CONTEXT_TOOL_NAME};
use crate::guardrails::ToolCapability;
use crate::llm::LlmClient;
use crate::prompts::{language_pack, render_context_prompt};

#[derive(Clone, Copy, Debug)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub relevance_threshold: f32,
    pub grounding: GroundingMode,
    pub language: Language,
}

/// Answers questions about client feedback from the retrieved documents.
pub struct ContextQueryTool {
    descriptor: ToolDescriptor,
    llm: Arc<dyn LlmClient>,
    settings: RetrievalSettings,
}

impl ContextQueryTool {
    pub fn new(llm: Arc<dyn LlmClient>, settings: RetrievalSettings) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: CONTEXT_TOOL_NAME,
                description: "Użyj tego narzędzia do wszystkich pytań i poleceń dotyczących \
                    opinii klientów, produktów i notatek."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Pełne pytanie lub polecenie użytkownika"
                        }
                    },
                    "required": ["query"]
                }),
            },
            llm,
            settings,
        }
    }
}

#[async_trait]
impl Tool for ContextQueryTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Retrieval
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<ToolOutput, ToolError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .ok_or_else(|| ToolError::InvalidInput("`query` must be a non-empty string".to_string()))?;
        let index = ctx.index.as_ref().ok_or(ToolError::NoData)?;
        let pack = language_pack(self.settings.language);

        let hits =
            index.search(query, self.settings.top_k, self.settings.relevance_threshold)?;
        debug!(
            event_name = "tool.context.retrieved",
            hits = hits.len(),
            best_score = hits.first().map(|hit| hit.score).unwrap_or(0.0),
            "context retrieved"
        );
        if hits.is_empty() {
            return Ok(ToolOutput::NotFound(pack.not_found.to_string()));
        }

        let prompt =
            render_context_prompt(self.settings.language, self.settings.grounding, query, &hits)?;
        let answer = self.llm.complete(pack.system_prompt, &prompt).await?;
        let answer = answer.trim();

        if answer.is_empty() || is_not_found(answer, pack.not_found) {
            return Ok(ToolOutput::NotFound(pack.not_found.to_string()));
        }
        Ok(ToolOutput::Answer(answer.to_string()))
    }
}

/// Sentinel match ignoring surrounding whitespace and trailing dots.
fn is_not_found(answer: &str, sentinel: &str) -> bool {
    answer.trim().trim_end_matches('.') == sentinel.trim().trim_end_matches('.')
}
