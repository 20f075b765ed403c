//! Tool selection and the final answer come from the hosted model; this module
//! only runs the call-execute-feed-back loop around it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use sekretarz_core::domain::conversation::{Role, Turn};

use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::tools::{ToolContext, ToolOutcome, ToolRegistry, ToolTraceEntry};

pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;

pub struct ReasoningRequest<'a> {
    pub system_prompt: &'a str,
    pub memory: &'a [Turn],
    pub utterance: &'a str,
    pub registry: &'a ToolRegistry,
    pub context: &'a ToolContext,
    /// Used when the model finishes with an empty reply.
    pub empty_answer: &'a str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReasoningOutcome {
    pub text: String,
    pub degraded: bool,
    pub trace: Vec<ToolTraceEntry>,
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("no final answer after {limit} tool iterations")]
    IterationLimit { limit: usize, trace: Vec<ToolTraceEntry> },
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn select_and_run(
        &self,
        request: ReasoningRequest<'_>,
    ) -> Result<ReasoningOutcome, ReasoningError>;
}

/// Native function-calling loop over an OpenAI-compatible chat model.
pub struct ToolCallingEngine {
    llm: Arc<dyn LlmClient>,
    max_iterations: usize,
}

impl ToolCallingEngine {
    pub fn new(llm: Arc<dyn LlmClient>, max_iterations: usize) -> Self {
        Self { llm, max_iterations: max_iterations.max(1) }
    }

    fn initial_messages(request: &ReasoningRequest<'_>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.memory.len() + 2);
        messages.push(ChatMessage::system(request.system_prompt));
        messages.extend(request.memory.iter().map(|turn| match turn.role {
            Role::User => ChatMessage::user(turn.text.clone()),
            Role::Assistant => ChatMessage::assistant(turn.text.clone()),
        }));
        messages.push(ChatMessage::user(request.utterance));
        messages
    }
}

#[async_trait]
impl ReasoningEngine for ToolCallingEngine {
    async fn select_and_run(
        &self,
        request: ReasoningRequest<'_>,
    ) -> Result<ReasoningOutcome, ReasoningError> {
        let tools = request.registry.offered_descriptors();
        let mut messages = Self::initial_messages(&request);
        let mut trace = Vec::new();

        for iteration in 0..self.max_iterations {
            let completion = self.llm.chat(&messages, &tools).await?;

            if completion.tool_calls.is_empty() {
                let text = completion
                    .content
                    .map(|content| content.trim().to_string())
                    .filter(|content| !content.is_empty())
                    .unwrap_or_else(|| request.empty_answer.to_string());
                info!(
                    event_name = "agent.reasoning.completed",
                    iterations = iteration + 1,
                    tool_calls = trace.len(),
                    "model produced a final answer"
                );
                return Ok(ReasoningOutcome { text, degraded: false, trace });
            }

            // Calls requested on the last iteration are never run.
            if iteration + 1 == self.max_iterations {
                warn!(
                    event_name = "agent.reasoning.limit_reached",
                    limit = self.max_iterations,
                    skipped_calls = completion.tool_calls.len(),
                    "tool calls requested on the final iteration were not executed"
                );
                break;
            }

            if let Some(content) = completion.content.filter(|content| !content.trim().is_empty()) {
                messages.push(ChatMessage::assistant(content));
            }

            for call in completion.tool_calls {
                debug!(event_name = "agent.tool_call", iteration, tool = %call.name, "model requested tool");
                let outcome =
                    request.registry.invoke(&call.name, call.arguments.clone(), request.context).await;

                if let ToolOutcome::Degraded { message, .. } = &outcome {
                    let text = message.clone();
                    trace.push(ToolTraceEntry { tool: call.name, input: call.arguments, outcome });
                    return Ok(ReasoningOutcome { text, degraded: true, trace });
                }

                messages.push(ChatMessage::user(outcome.feedback(&call.name)));
                trace.push(ToolTraceEntry { tool: call.name, input: call.arguments, outcome });
            }
        }

        Err(ReasoningError::IterationLimit { limit: self.max_iterations, trace })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;

    use sekretarz_core::config::Language;
    use sekretarz_core::domain::conversation::Turn;

    use super::{ReasoningEngine, ReasoningError, ReasoningRequest, ToolCallingEngine};
    use crate::llm::{ChatCompletion, ChatMessage, ChatRole, LlmClient, LlmError, ToolCall};
    use crate::tools::{
        DateTool, ReportTool, ToolContext, ToolDescriptor, ToolOutcome, ToolRegistry,
    };

    struct ScriptedLlm {
        replies: Mutex<VecDeque<ChatCompletion>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<ChatCompletion>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
            Ok(String::new())
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolDescriptor],
        ) -> Result<ChatCompletion, LlmError> {
            self.seen.lock().expect("lock").push(messages.to_vec());
            let next = self.replies.lock().expect("lock").pop_front();
            Ok(next.unwrap_or_else(|| ChatCompletion::calls(vec![date_call()])))
        }
    }

    fn date_call() -> ToolCall {
        ToolCall { id: "call".to_string(), name: "narzedzie_daty".to_string(), arguments: json!({}) }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).expect("date");
        registry.register(DateTool::fixed(date)).expect("register");
        registry
    }

    fn request<'a>(
        registry: &'a ToolRegistry,
        context: &'a ToolContext,
        memory: &'a [Turn],
    ) -> ReasoningRequest<'a> {
        ReasoningRequest {
            system_prompt: "system",
            memory,
            utterance: "Jaka jest dzisiaj data?",
            registry,
            context,
            empty_answer: "brak",
        }
    }

    #[tokio::test]
    async fn tool_result_is_fed_back_before_final_answer() {
        let llm = ScriptedLlm::new(vec![
            ChatCompletion::calls(vec![date_call()]),
            ChatCompletion::text("Dziś jest 2024-03-07."),
        ]);
        let engine = ToolCallingEngine::new(llm.clone(), 10);
        let registry = registry();
        let context = ToolContext::default();
        let memory = [Turn::user("hej"), Turn::assistant("Cześć!")];

        let outcome =
            engine.select_and_run(request(&registry, &context, &memory)).await.expect("outcome");

        assert_eq!(outcome.text, "Dziś jest 2024-03-07.");
        assert_eq!(outcome.trace.len(), 1);
        assert_eq!(outcome.trace[0].outcome, ToolOutcome::Success("2024-03-07".to_string()));

        let seen = llm.seen.lock().expect("lock");
        assert_eq!(seen[0].len(), 4);
        assert_eq!(seen[0][1].role, ChatRole::User);
        let feedback = seen[1].last().expect("feedback message");
        assert_eq!(feedback.content, "[Tool Result for narzedzie_daty]: 2024-03-07");
    }

    #[tokio::test]
    async fn empty_final_reply_uses_fallback_answer() {
        let engine = ToolCallingEngine::new(ScriptedLlm::new(vec![ChatCompletion::text("  ")]), 10);
        let registry = registry();
        let context = ToolContext::default();

        let outcome = engine.select_and_run(request(&registry, &context, &[])).await.expect("outcome");

        assert_eq!(outcome.text, "brak");
        assert!(outcome.trace.is_empty());
    }

    #[tokio::test]
    async fn calls_requested_on_the_final_iteration_are_not_executed() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let report_call = ToolCall {
            id: "call".to_string(),
            name: "zapisz_raport".to_string(),
            arguments: json!({ "filename": "raport.md", "content": "# Raport" }),
        };
        let llm = ScriptedLlm::new(vec![ChatCompletion::calls(vec![report_call])]);
        let engine = ToolCallingEngine::new(llm.clone(), 1);
        let mut registry = ToolRegistry::default();
        registry.register(ReportTool::new(dir.path(), Language::Polish)).expect("register");
        let context = ToolContext::default();

        let error =
            engine.select_and_run(request(&registry, &context, &[])).await.expect_err("limit");

        match error {
            ReasoningError::IterationLimit { limit, trace } => {
                assert_eq!(limit, 1);
                assert!(trace.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dir.path().join("raport.md").exists());
        assert_eq!(llm.seen.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_the_iteration_limit() {
        let engine = ToolCallingEngine::new(ScriptedLlm::new(Vec::new()), 3);
        let registry = registry();
        let context = ToolContext::default();

        let error =
            engine.select_and_run(request(&registry, &context, &[])).await.expect_err("limit");

        match error {
            ReasoningError::IterationLimit { limit, trace } => {
                assert_eq!(limit, 3);
                assert_eq!(trace.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
