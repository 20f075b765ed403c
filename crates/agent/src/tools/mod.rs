use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::{ContextError, VectorIndex};
use crate::guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy, ToolCapability};
use crate::llm::LlmError;
use crate::prompts::PromptError;

pub mod context;
pub mod date;
pub mod report;

pub use context::ContextQueryTool;
pub use date::DateTool;
pub use report::ReportTool;

pub const DATE_TOOL_NAME: &str = "narzedzie_daty";
pub const CONTEXT_TOOL_NAME: &str = "analizator_danych";
pub const REPORT_TOOL_NAME: &str = "zapisz_raport";

/// Name, description and JSON-schema input contract offered to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: String,
    pub input_schema: Value,
}

/// Per-turn snapshot handed to tools.
#[derive(Clone, Default)]
pub struct ToolContext {
    pub index: Option<Arc<VectorIndex>>,
}

impl ToolContext {
    pub fn with_index(index: Option<Arc<VectorIndex>>) -> Self {
        Self { index }
    }

    pub fn knowledge_available(&self) -> bool {
        self.index.as_ref().map(|index| !index.is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutput {
    Answer(String),
    /// Explicit "not in the knowledge base" reply, never empty.
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    #[error("invalid report filename `{0}`")]
    InvalidFilename(String),
    #[error("knowledge base has no data")]
    NoData,
    #[error("tool `{0}` is already registered")]
    DuplicateName(&'static str),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("could not write `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;
    fn capability(&self) -> ToolCapability;
    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<ToolOutput, ToolError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Success(String),
    NotFound(String),
    Denied { reason_code: &'static str, message: String },
    Degraded { reason_code: &'static str, message: String },
    Failed(String),
}

impl ToolOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::NotFound(_) => "not_found",
            Self::Denied { .. } => "denied",
            Self::Degraded { .. } => "degraded",
            Self::Failed(_) => "failed",
        }
    }

    /// Message fed back to the model after the call.
    pub fn feedback(&self, tool: &str) -> String {
        match self {
            Self::Success(text) | Self::NotFound(text) => {
                format!("[Tool Result for {tool}]: {text}")
            }
            Self::Denied { message, .. } | Self::Degraded { message, .. } => {
                format!("[Tool Error for {tool}]: {message}")
            }
            Self::Failed(message) => format!("[Tool Error for {tool}]: {message}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolTraceEntry {
    pub tool: String,
    pub input: Value,
    pub outcome: ToolOutcome,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    guardrails: GuardrailPolicy,
}

impl ToolRegistry {
    pub fn new(guardrails: GuardrailPolicy) -> Self {
        Self { tools: Vec::new(), guardrails }
    }

    pub fn register<T>(&mut self, tool: T) -> Result<(), ToolError>
    where
        T: Tool + 'static,
    {
        let name = tool.descriptor().name;
        if self.get(name).is_some() {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.push(Box::new(tool));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn guardrails(&self) -> &GuardrailPolicy {
        &self.guardrails
    }

    /// All descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor().clone()).collect()
    }

    /// Descriptors of the tools the guardrails let the model see.
    pub fn offered_descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .filter(|tool| self.guardrails.offers(tool.capability()))
            .map(|tool| tool.descriptor().clone())
            .collect()
    }

    fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|tool| tool.descriptor().name == name).map(|tool| tool.as_ref())
    }

    pub async fn invoke(&self, name: &str, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(tool) = self.get(name) else {
            warn!(event_name = "tool.unknown", tool = name, "model requested an unknown tool");
            return ToolOutcome::Failed(format!("unknown tool `{name}`"));
        };

        let intent = GuardrailIntent {
            capability: tool.capability(),
            knowledge_available: ctx.knowledge_available(),
        };
        let outcome = match self.guardrails.evaluate(&intent) {
            GuardrailDecision::Allow => match tool.execute(ctx, input).await {
                Ok(ToolOutput::Answer(text)) => ToolOutcome::Success(text),
                Ok(ToolOutput::NotFound(text)) => ToolOutcome::NotFound(text),
                Err(error) => ToolOutcome::Failed(error.to_string()),
            },
            GuardrailDecision::Deny { reason_code, user_message, .. } => {
                ToolOutcome::Denied { reason_code, message: user_message }
            }
            GuardrailDecision::Degrade { reason_code, user_message, .. } => {
                ToolOutcome::Degraded { reason_code, message: user_message }
            }
        };

        info!(
            event_name = "tool.invoked",
            tool = name,
            action_key = intent.capability.action_key(),
            outcome = outcome.label(),
            "tool invocation finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{
        Tool, ToolContext, ToolDescriptor, ToolError, ToolOutcome, ToolOutput, ToolRegistry,
    };
    use crate::guardrails::{GuardrailPolicy, ToolCapability};

    struct EchoTool {
        descriptor: ToolDescriptor,
        capability: ToolCapability,
    }

    impl EchoTool {
        fn new(name: &'static str, capability: ToolCapability) -> Self {
            Self {
                descriptor: ToolDescriptor {
                    name,
                    description: format!("echo {name}"),
                    input_schema: json!({ "type": "object" }),
                },
                capability,
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        fn capability(&self) -> ToolCapability {
            self.capability
        }

        async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::Answer(input.to_string()))
        }
    }

    #[test]
    fn duplicate_names_are_rejected_and_order_is_kept() {
        let mut registry = ToolRegistry::default();
        registry.register(EchoTool::new("b", ToolCapability::Clock)).expect("register b");
        registry.register(EchoTool::new("a", ToolCapability::Clock)).expect("register a");

        assert!(matches!(
            registry.register(EchoTool::new("a", ToolCapability::Clock)),
            Err(ToolError::DuplicateName("a"))
        ));
        let names: Vec<_> = registry.descriptors().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_panicking() {
        let registry = ToolRegistry::default();

        let outcome = registry.invoke("missing", json!({}), &ToolContext::default()).await;

        assert_eq!(outcome, ToolOutcome::Failed("unknown tool `missing`".to_string()));
        assert_eq!(outcome.feedback("missing"), "[Tool Error for missing]: unknown tool `missing`");
    }

    #[tokio::test]
    async fn retrieval_without_index_degrades() {
        let mut registry = ToolRegistry::default();
        registry.register(EchoTool::new("search", ToolCapability::Retrieval)).expect("register");

        let outcome = registry.invoke("search", json!({ "query": "x" }), &ToolContext::default()).await;

        assert!(matches!(outcome, ToolOutcome::Degraded { reason_code: "knowledge_base_empty", .. }));
    }

    #[tokio::test]
    async fn disabled_file_writes_are_hidden_and_denied() {
        let mut registry = ToolRegistry::new(GuardrailPolicy {
            report_writes_enabled: false,
            ..GuardrailPolicy::default()
        });
        registry.register(EchoTool::new("clock", ToolCapability::Clock)).expect("register");
        registry.register(EchoTool::new("write", ToolCapability::FileWrite)).expect("register");

        let offered: Vec<_> = registry.offered_descriptors().iter().map(|d| d.name).collect();
        assert_eq!(offered, vec!["clock"]);

        let outcome = registry.invoke("write", json!({}), &ToolContext::default()).await;
        assert!(matches!(outcome, ToolOutcome::Denied { reason_code: "report_writes_disabled", .. }));
    }

    #[tokio::test]
    async fn successful_result_is_fed_back_with_tool_name() {
        let mut registry = ToolRegistry::default();
        registry.register(EchoTool::new("clock", ToolCapability::Clock)).expect("register");

        let outcome = registry.invoke("clock", json!({ "a": 1 }), &ToolContext::default()).await;

        assert_eq!(outcome.feedback("clock"), r#"[Tool Result for clock]: {"a":1}"#);
    }
}
