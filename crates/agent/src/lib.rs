//! Knowledge-base chat agent over customer feedback records.
//!
//! Per turn the runtime refreshes the context index from the record store,
//! hands the tool registry to the hosted model through a [`ReasoningEngine`],
//! and records the exchange in the conversation history.
//!
//! # Key Types
//!
//! - `AgentRuntime` - session object (see `runtime` module)
//! - `LlmClient` - hosted chat-completions seam (Groq, OpenAI, Ollama)
//! - `ToolRegistry` - date, context-query and report tools behind `GuardrailPolicy`
//! - `ConversationController` - history, memory window and turn state
//!
//! The model chooses tools and phrases answers. It never writes records.

pub mod context;
pub mod conversation;
pub mod embedding;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod reasoning;
pub mod runtime;
pub mod tools;

pub use conversation::{Answer, AnswerKind, ConversationController};
pub use llm::{LlmClient, OpenAiCompatibleClient};
pub use reasoning::{ReasoningEngine, ToolCallingEngine};
pub use runtime::{AgentRuntime, RuntimeError};
