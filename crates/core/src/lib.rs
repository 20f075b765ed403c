pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, GroundingMode, Language, LlmProvider, LoadOptions};
pub use domain::conversation::{Role, Turn};
pub use domain::record::{ProjectStatus, Record, RecordSetFingerprint, RECORD_HEADER};
pub use errors::{ApplicationError, DomainError, Propagation};
