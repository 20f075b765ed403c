use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use thiserror::Error;
use tracing::Level;

use sekretarz_agent::llm::LlmError;
use sekretarz_agent::{AgentRuntime, OpenAiCompatibleClient, RuntimeError};
use sekretarz_core::config::{
    AppConfig, ConfigError, ConfigOverrides, GroundingMode, Language, LlmProvider, LoadOptions,
    LogFormat,
};
use sekretarz_db::{CsvRecordRepository, RecordStore, StoreError};

use crate::commands::CommandResult;

/// Flags shared by every command; they override file and environment settings.
#[derive(Clone, Debug, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Path to sekretarz.toml")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Path to the CSV record store")]
    pub data: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory with .txt/.md notes to index")]
    pub notes: Option<PathBuf>,
    #[arg(long, global = true, help = "Answer language: pl|en")]
    pub language: Option<String>,
    #[arg(long, global = true, help = "Grounding mode: strict|loose")]
    pub grounding: Option<String>,
    #[arg(long, global = true, help = "LLM provider: groq|openai|ollama")]
    pub provider: Option<String>,
    #[arg(long, global = true, help = "LLM model name")]
    pub model: Option<String>,
    #[arg(long, global = true, help = "Log level: trace|debug|info|warn|error")]
    pub log_level: Option<String>,
}

impl GlobalArgs {
    pub fn load_options(&self) -> Result<LoadOptions, ConfigError> {
        Ok(LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                data_path: self.data.clone(),
                notes_dir: self.notes.clone(),
                log_level: self.log_level.clone(),
                llm_provider: self.provider.as_deref().map(str::parse::<LlmProvider>).transpose()?,
                llm_model: self.model.clone(),
                llm_api_key: None,
                language: self.language.as_deref().map(str::parse::<Language>).transpose()?,
                grounding: self.grounding.as_deref().map(str::parse::<GroundingMode>).transpose()?,
            },
        })
    }

    /// Flag that overrode `key_path`, if one was given.
    pub fn override_flag(&self, key_path: &str) -> Option<&'static str> {
        let (set, flag) = match key_path {
            "knowledge.data_path" => (self.data.is_some(), "--data"),
            "knowledge.notes_dir" => (self.notes.is_some(), "--notes"),
            "agent.language" => (self.language.is_some(), "--language"),
            "agent.grounding" => (self.grounding.is_some(), "--grounding"),
            "llm.provider" => (self.provider.is_some(), "--provider"),
            "llm.model" => (self.model.is_some(), "--model"),
            "logging.level" => (self.log_level.is_some(), "--log-level"),
            _ => (false, ""),
        };
        set.then_some(flag)
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("failed to initialize async runtime: {0}")]
    AsyncRuntime(String),
}

impl BootstrapError {
    pub fn into_result(self, command: &str) -> CommandResult {
        let (error_class, exit_code) = match &self {
            Self::Config(_) => ("config_validation", 2),
            Self::Store(StoreError::Domain(_)) => ("validation", 1),
            Self::Store(StoreError::Repository(_))
            | Self::Runtime(RuntimeError::Store(StoreError::Repository(_))) => ("persistence", 3),
            Self::Llm(_) => ("integration", 4),
            Self::Runtime(_) | Self::AsyncRuntime(_) => ("runtime_init", 1),
        };
        CommandResult::failure(command, error_class, self.to_string(), exit_code)
    }
}

pub fn load_config(global: &GlobalArgs) -> Result<AppConfig, BootstrapError> {
    let config = AppConfig::load(global.load_options()?)?;
    init_logging(&config);
    Ok(config)
}

/// Installs the global subscriber once; later calls are no-ops. Logs go to stderr.
pub fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn async_runtime() -> Result<tokio::runtime::Runtime, BootstrapError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| BootstrapError::AsyncRuntime(error.to_string()))
}

pub async fn open_store(config: &AppConfig) -> Result<RecordStore, BootstrapError> {
    let repository = Arc::new(CsvRecordRepository::new(&config.knowledge.data_path));
    Ok(RecordStore::open(repository).await?)
}

pub async fn open_session(config: &AppConfig) -> Result<AgentRuntime, BootstrapError> {
    let repository = Arc::new(CsvRecordRepository::new(&config.knowledge.data_path));
    let llm = Arc::new(OpenAiCompatibleClient::from_config(&config.llm)?);
    Ok(AgentRuntime::open(config, repository, llm).await?)
}
