use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub knowledge: KnowledgeConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub data_path: PathBuf,
    pub notes_dir: Option<PathBuf>,
    pub top_k: usize,
    pub relevance_threshold: f32,
    pub embedding_dimensions: usize,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub language: Language,
    pub grounding: GroundingMode,
    pub memory_token_limit: usize,
    pub max_tool_iterations: usize,
    pub report_tool_enabled: bool,
    pub reports_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Groq | Self::OpenAi)
    }
}

/// Language the assistant answers in; selects the system prompt and canned messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[serde(alias = "pl", alias = "polski")]
    Polish,
    #[serde(alias = "en", alias = "angielski")]
    English,
}

/// Whether context answers may only come from retrieved documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundingMode {
    Strict,
    Loose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub data_path: Option<PathBuf>,
    pub notes_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub language: Option<Language>,
    pub grounding: Option<GroundingMode>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            knowledge: KnowledgeConfig {
                data_path: PathBuf::from("data.csv"),
                notes_dir: None,
                top_k: 2,
                relevance_threshold: 0.1,
                embedding_dimensions: 1024,
            },
            llm: LlmConfig {
                provider: LlmProvider::Groq,
                api_key: None,
                base_url: None,
                model: "llama-3.3-70b-versatile".to_string(),
                timeout_secs: 60,
                max_retries: 2,
                temperature: 0.1,
            },
            agent: AgentConfig {
                language: Language::Polish,
                grounding: GroundingMode::Strict,
                memory_token_limit: 3000,
                max_tool_iterations: 10,
                report_tool_enabled: true,
                reports_dir: PathBuf::from("reports"),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pl" | "polish" | "polski" => Ok(Self::Polish),
            "en" | "english" | "angielski" => Ok(Self::English),
            other => Err(ConfigError::Validation(format!(
                "unsupported language `{other}` (expected polish|english)"
            ))),
        }
    }
}

impl std::str::FromStr for GroundingMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "loose" => Ok(Self::Loose),
            other => Err(ConfigError::Validation(format!(
                "unsupported grounding mode `{other}` (expected strict|loose)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.provider.default_base_url())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("sekretarz.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(knowledge) = patch.knowledge {
            if let Some(data_path) = knowledge.data_path {
                self.knowledge.data_path = data_path;
            }
            if let Some(notes_dir) = knowledge.notes_dir {
                self.knowledge.notes_dir = Some(notes_dir);
            }
            if let Some(top_k) = knowledge.top_k {
                self.knowledge.top_k = top_k;
            }
            if let Some(relevance_threshold) = knowledge.relevance_threshold {
                self.knowledge.relevance_threshold = relevance_threshold;
            }
            if let Some(embedding_dimensions) = knowledge.embedding_dimensions {
                self.knowledge.embedding_dimensions = embedding_dimensions;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(language) = agent.language {
                self.agent.language = language;
            }
            if let Some(grounding) = agent.grounding {
                self.agent.grounding = grounding;
            }
            if let Some(memory_token_limit) = agent.memory_token_limit {
                self.agent.memory_token_limit = memory_token_limit;
            }
            if let Some(max_tool_iterations) = agent.max_tool_iterations {
                self.agent.max_tool_iterations = max_tool_iterations;
            }
            if let Some(report_tool_enabled) = agent.report_tool_enabled {
                self.agent.report_tool_enabled = report_tool_enabled;
            }
            if let Some(reports_dir) = agent.reports_dir {
                self.agent.reports_dir = reports_dir;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SEKRETARZ_KNOWLEDGE_DATA_PATH") {
            self.knowledge.data_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("SEKRETARZ_KNOWLEDGE_NOTES_DIR") {
            self.knowledge.notes_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("SEKRETARZ_KNOWLEDGE_TOP_K") {
            self.knowledge.top_k = parse_usize("SEKRETARZ_KNOWLEDGE_TOP_K", &value)?;
        }
        if let Some(value) = read_env("SEKRETARZ_KNOWLEDGE_RELEVANCE_THRESHOLD") {
            self.knowledge.relevance_threshold =
                parse_f32("SEKRETARZ_KNOWLEDGE_RELEVANCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("SEKRETARZ_KNOWLEDGE_EMBEDDING_DIMENSIONS") {
            self.knowledge.embedding_dimensions =
                parse_usize("SEKRETARZ_KNOWLEDGE_EMBEDDING_DIMENSIONS", &value)?;
        }

        if let Some(value) = read_env("SEKRETARZ_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SEKRETARZ_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SEKRETARZ_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SEKRETARZ_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SEKRETARZ_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SEKRETARZ_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SEKRETARZ_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SEKRETARZ_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("SEKRETARZ_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("SEKRETARZ_LLM_TEMPERATURE", &value)?;
        }
        // Groq's own variable is honoured when no key was configured explicitly.
        if self.llm.api_key.is_none() {
            if let Some(value) = read_env("GROQ_API_KEY") {
                self.llm.api_key = Some(secret_value(value));
            }
        }

        if let Some(value) = read_env("SEKRETARZ_AGENT_LANGUAGE") {
            self.agent.language = value.parse()?;
        }
        if let Some(value) = read_env("SEKRETARZ_AGENT_GROUNDING") {
            self.agent.grounding = value.parse()?;
        }
        if let Some(value) = read_env("SEKRETARZ_AGENT_MEMORY_TOKEN_LIMIT") {
            self.agent.memory_token_limit =
                parse_usize("SEKRETARZ_AGENT_MEMORY_TOKEN_LIMIT", &value)?;
        }
        if let Some(value) = read_env("SEKRETARZ_AGENT_MAX_TOOL_ITERATIONS") {
            self.agent.max_tool_iterations =
                parse_usize("SEKRETARZ_AGENT_MAX_TOOL_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("SEKRETARZ_AGENT_REPORT_TOOL_ENABLED") {
            self.agent.report_tool_enabled =
                parse_bool("SEKRETARZ_AGENT_REPORT_TOOL_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SEKRETARZ_AGENT_REPORTS_DIR") {
            self.agent.reports_dir = PathBuf::from(value);
        }

        let log_level =
            read_env("SEKRETARZ_LOGGING_LEVEL").or_else(|| read_env("SEKRETARZ_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SEKRETARZ_LOGGING_FORMAT").or_else(|| read_env("SEKRETARZ_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_path) = overrides.data_path {
            self.knowledge.data_path = data_path;
        }
        if let Some(notes_dir) = overrides.notes_dir {
            self.knowledge.notes_dir = Some(notes_dir);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(language) = overrides.language {
            self.agent.language = language;
        }
        if let Some(grounding) = overrides.grounding {
            self.agent.grounding = grounding;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_knowledge(&self.knowledge)?;
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("sekretarz.toml"), PathBuf::from("config/sekretarz.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    if knowledge.data_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("knowledge.data_path must not be empty".to_string()));
    }

    if knowledge.top_k == 0 || knowledge.top_k > 20 {
        return Err(ConfigError::Validation("knowledge.top_k must be in range 1..=20".to_string()));
    }

    if !(0.0..=1.0).contains(&knowledge.relevance_threshold) {
        return Err(ConfigError::Validation(
            "knowledge.relevance_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    if knowledge.embedding_dimensions < 16 || knowledge.embedding_dimensions > 65_536 {
        return Err(ConfigError::Validation(
            "knowledge.embedding_dimensions must be in range 16..=65536".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.provider.requires_api_key() {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for groq/openai providers. Set SEKRETARZ_LLM_API_KEY or GROQ_API_KEY (https://console.groq.com/keys)".to_string(),
            ));
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.memory_token_limit == 0 {
        return Err(ConfigError::Validation(
            "agent.memory_token_limit must be greater than zero".to_string(),
        ));
    }

    if agent.max_tool_iterations == 0 || agent.max_tool_iterations > 50 {
        return Err(ConfigError::Validation(
            "agent.max_tool_iterations must be in range 1..=50".to_string(),
        ));
    }

    if agent.report_tool_enabled && agent.reports_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "agent.reports_dir must be set when the report tool is enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    knowledge: Option<KnowledgePatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    data_path: Option<PathBuf>,
    notes_dir: Option<PathBuf>,
    top_k: Option<usize>,
    relevance_threshold: Option<f32>,
    embedding_dimensions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    language: Option<Language>,
    grounding: Option<GroundingMode>,
    memory_token_limit: Option<usize>,
    max_tool_iterations: Option<usize>,
    report_tool_enabled: Option<bool>,
    reports_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
