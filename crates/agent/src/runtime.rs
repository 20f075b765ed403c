use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use sekretarz_core::config::{AppConfig, Language};
use sekretarz_core::domain::conversation::Turn;
use sekretarz_core::domain::record::Record;
use sekretarz_db::{RecordRepository, RecordStore, StoreError};

use crate::context::{load_note_documents, ContextBuilder, ContextError};
use crate::conversation::{Answer, AnswerKind, ConversationController, TurnDispatch};
use crate::embedding::{Embedder, EmbeddingError, HashingEmbedder};
use crate::guardrails::GuardrailPolicy;
use crate::llm::LlmClient;
use crate::memory::MemoryWindow;
use crate::prompts::language_pack;
use crate::reasoning::{ReasoningEngine, ToolCallingEngine};
use crate::tools::context::RetrievalSettings;
use crate::tools::{ContextQueryTool, DateTool, ReportTool, ToolContext, ToolError, ToolRegistry};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// One chat session: record store, index, tools and conversation state.
pub struct AgentRuntime {
    store: RecordStore,
    context: ContextBuilder,
    registry: ToolRegistry,
    controller: ConversationController,
    engine: Arc<dyn ReasoningEngine>,
    language: Language,
}

impl AgentRuntime {
    /// Opens a session with the shipped function-calling engine.
    pub async fn open(
        config: &AppConfig,
        repository: Arc<dyn RecordRepository>,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, RuntimeError> {
        let engine = Arc::new(ToolCallingEngine::new(
            Arc::clone(&llm),
            config.agent.max_tool_iterations,
        ));
        Self::open_with_engine(config, repository, llm, engine).await
    }

    pub async fn open_with_engine(
        config: &AppConfig,
        repository: Arc<dyn RecordRepository>,
        llm: Arc<dyn LlmClient>,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Result<Self, RuntimeError> {
        let store = RecordStore::open(repository).await?;

        let notes = match &config.knowledge.notes_dir {
            Some(dir) => load_note_documents(dir).await?,
            None => Vec::new(),
        };
        let embedder: Arc<dyn Embedder> =
            Arc::new(HashingEmbedder::new(config.knowledge.embedding_dimensions)?);
        let context = ContextBuilder::new(embedder, notes);

        let language = config.agent.language;
        let mut registry = ToolRegistry::new(GuardrailPolicy {
            report_writes_enabled: config.agent.report_tool_enabled,
            language,
        });
        registry.register(DateTool::new())?;
        registry.register(ContextQueryTool::new(
            llm,
            RetrievalSettings {
                top_k: config.knowledge.top_k,
                relevance_threshold: config.knowledge.relevance_threshold,
                grounding: config.agent.grounding,
                language,
            },
        ))?;
        registry.register(ReportTool::new(&config.agent.reports_dir, language))?;

        info!(
            event_name = "agent.session.opened",
            records = store.len(),
            notes = context.note_count(),
            tools = registry.len(),
            language = ?language,
            grounding = ?config.agent.grounding,
            "session opened"
        );

        Ok(Self {
            store,
            context,
            registry,
            controller: ConversationController::new(MemoryWindow::new(
                config.agent.memory_token_limit,
            )),
            engine,
            language,
        })
    }

    pub fn greeting(&self) -> &'static str {
        language_pack(self.language).greeting
    }

    pub fn records(&self) -> &[Record] {
        self.store.records()
    }

    pub fn history(&self) -> &[Turn] {
        self.controller.history()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn index_rebuilds(&self) -> u64 {
        self.context.rebuild_count()
    }

    pub async fn add_record(&mut self, record: Record) -> Result<&[Record], StoreError> {
        self.store.append(record).await
    }

    /// Runs one turn against an index that reflects the current record set.
    pub async fn handle_message(&mut self, text: &str) -> Answer {
        let pack = language_pack(self.language);

        let index = match self.context.index_for(self.store.fingerprint(), self.store.records()) {
            Ok(index) => index,
            Err(index_error) => {
                error!(
                    event_name = "context.index.failed",
                    error = %index_error,
                    "could not refresh context index"
                );
                return Answer {
                    kind: AnswerKind::Failed,
                    text: pack.failure.to_string(),
                    trace: Vec::new(),
                };
            }
        };
        let context = ToolContext::with_index(index);

        self.controller
            .submit(
                text,
                TurnDispatch {
                    engine: self.engine.as_ref(),
                    registry: &self.registry,
                    context: &context,
                    messages: pack,
                },
            )
            .await
    }
}
