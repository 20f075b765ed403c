use tracing::{info, warn};

use sekretarz_core::domain::conversation::Turn;
use sekretarz_core::errors::ApplicationError;

use crate::memory::MemoryWindow;
use crate::prompts::LanguagePack;
use crate::reasoning::{ReasoningEngine, ReasoningError, ReasoningRequest};
use crate::tools::{ToolContext, ToolRegistry, ToolTraceEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Dispatching,
    Errored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerKind {
    Final,
    /// The turn finished with a canned message, e.g. the knowledge base is empty.
    Degraded,
    /// The turn failed; the exchange was not recorded.
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Answer {
    pub kind: AnswerKind,
    pub text: String,
    pub trace: Vec<ToolTraceEntry>,
}

impl Answer {
    pub fn calls_to(&self, tool: &str) -> usize {
        self.trace.iter().filter(|entry| entry.tool == tool).count()
    }
}

/// Everything one turn needs besides the history.
pub struct TurnDispatch<'a> {
    pub engine: &'a dyn ReasoningEngine,
    pub registry: &'a ToolRegistry,
    pub context: &'a ToolContext,
    pub messages: &'a LanguagePack,
}

pub struct ConversationController {
    history: Vec<Turn>,
    memory: MemoryWindow,
    state: ControllerState,
}

impl ConversationController {
    pub fn new(memory: MemoryWindow) -> Self {
        Self { history: Vec::new(), memory, state: ControllerState::Idle }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn memory_view(&self) -> &[Turn] {
        self.memory.view(&self.history)
    }

    /// Runs one turn. A failed turn leaves the history as it was before the call.
    pub async fn submit(&mut self, utterance: &str, dispatch: TurnDispatch<'_>) -> Answer {
        self.state = ControllerState::Dispatching;
        self.history.push(Turn::user(utterance));

        let window = self.memory.view(&self.history);
        let memory = &window[..window.len().saturating_sub(1)];
        let request = ReasoningRequest {
            system_prompt: dispatch.messages.system_prompt,
            memory,
            utterance,
            registry: dispatch.registry,
            context: dispatch.context,
            empty_answer: dispatch.messages.not_found,
        };

        match dispatch.engine.select_and_run(request).await {
            Ok(outcome) => {
                let kind = if outcome.degraded { AnswerKind::Degraded } else { AnswerKind::Final };
                self.history.push(Turn::assistant(outcome.text.clone()));
                self.state = ControllerState::Idle;

                info!(
                    event_name = "agent.turn.completed",
                    kind = ?kind,
                    tool_calls = outcome.trace.len(),
                    history = self.history.len(),
                    "turn completed"
                );
                Answer { kind, text: outcome.text, trace: outcome.trace }
            }
            Err(error) => {
                self.state = ControllerState::Errored;
                let (app_error, text, trace) = match error {
                    ReasoningError::IterationLimit { limit, trace } => (
                        ApplicationError::ToolIterationExceeded { limit },
                        dispatch.messages.failure,
                        trace,
                    ),
                    ReasoningError::Llm(error) => (
                        ApplicationError::Integration(error.to_string()),
                        dispatch.messages.llm_unavailable,
                        Vec::new(),
                    ),
                };

                self.history.pop();
                warn!(
                    event_name = "agent.turn.failed",
                    error_class = app_error.error_class(),
                    error = %app_error,
                    history = self.history.len(),
                    "turn failed; exchange discarded"
                );
                self.state = ControllerState::Idle;

                Answer { kind: AnswerKind::Failed, text: text.to_string(), trace }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use sekretarz_core::config::Language;
    use sekretarz_core::domain::conversation::{Role, Turn};

    use super::{AnswerKind, ControllerState, ConversationController, TurnDispatch};
    use crate::llm::LlmError;
    use crate::memory::MemoryWindow;
    use crate::prompts::language_pack;
    use crate::reasoning::{ReasoningEngine, ReasoningError, ReasoningOutcome, ReasoningRequest};
    use crate::tools::{ToolContext, ToolRegistry};

    /// Echoes how much memory it was given, or fails on demand.
    struct MemoryRecorder;

    #[async_trait]
    impl ReasoningEngine for MemoryRecorder {
        async fn select_and_run(
            &self,
            request: ReasoningRequest<'_>,
        ) -> Result<ReasoningOutcome, ReasoningError> {
            match request.utterance {
                "loop" => Err(ReasoningError::IterationLimit { limit: 10, trace: Vec::new() }),
                "offline" => Err(ReasoningError::Llm(LlmError::Transport("down".to_string()))),
                _ => Ok(ReasoningOutcome {
                    text: format!("memory={}", request.memory.len()),
                    degraded: false,
                    trace: Vec::new(),
                }),
            }
        }
    }

    async fn send(controller: &mut ConversationController, text: &str) -> super::Answer {
        let registry = ToolRegistry::default();
        let context = ToolContext::default();
        controller
            .submit(
                text,
                TurnDispatch {
                    engine: &MemoryRecorder,
                    registry: &registry,
                    context: &context,
                    messages: language_pack(Language::Polish),
                },
            )
            .await
    }

    #[tokio::test]
    async fn successful_turns_append_both_sides() {
        let mut controller = ConversationController::new(MemoryWindow::new(3000));

        let first = send(&mut controller, "hej").await;
        let second = send(&mut controller, "co dalej?").await;

        assert_eq!(first.text, "memory=0");
        assert_eq!(second.text, "memory=2");
        assert_eq!(controller.history().len(), 4);
        assert_eq!(controller.history()[3], Turn::assistant("memory=2"));
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn iteration_limit_returns_failure_and_keeps_history_intact() {
        let mut controller = ConversationController::new(MemoryWindow::new(3000));
        send(&mut controller, "hej").await;
        let before = controller.history().to_vec();

        let answer = send(&mut controller, "loop").await;

        assert_eq!(answer.kind, AnswerKind::Failed);
        assert_eq!(answer.text, language_pack(Language::Polish).failure);
        assert_eq!(controller.history(), before.as_slice());
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn unavailable_model_is_a_failed_turn() {
        let mut controller = ConversationController::new(MemoryWindow::new(3000));

        let answer = send(&mut controller, "offline").await;

        assert_eq!(answer.kind, AnswerKind::Failed);
        assert_eq!(answer.text, language_pack(Language::Polish).llm_unavailable);
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn small_budget_limits_memory_but_keeps_latest_utterance() {
        let mut controller = ConversationController::new(MemoryWindow::new(3));
        send(&mut controller, "pierwsze pytanie o klientów").await;

        let answer = send(&mut controller, "drugie").await;

        assert_eq!(answer.text, "memory=0");
        let view = controller.memory_view();
        assert_eq!(view.last().map(|turn| turn.role), Some(Role::Assistant));
        assert!(view.iter().any(|turn| turn.text == "drugie"));
    }
}
