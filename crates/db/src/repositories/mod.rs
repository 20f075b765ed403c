use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use sekretarz_core::domain::record::Record;

pub mod csv_file;
pub mod memory;

pub use csv_file::CsvRecordRepository;
pub use memory::InMemoryRecordRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("i/o error on `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("decode error at line {line}: {message}")]
    Decode { line: u64, message: String },
    #[error("encode error: {0}")]
    Encode(String),
}

/// Full-scan storage of the record set. Implementations replace the whole set on save.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Record>, RepositoryError>;
    async fn save_all(&self, records: &[Record]) -> Result<(), RepositoryError>;
}
