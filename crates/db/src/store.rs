use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use sekretarz_core::domain::record::{Record, RecordSetFingerprint};
use sekretarz_core::errors::{ApplicationError, DomainError};

use crate::repositories::{RecordRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<StoreError> for ApplicationError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Domain(error) => ApplicationError::Domain(error),
            StoreError::Repository(error) => ApplicationError::Persistence(error.to_string()),
        }
    }
}

/// Authoritative, append-only record set with write-through persistence.
///
/// Every successful append bumps `version`; derived structures compare the
/// fingerprint to decide whether they are stale.
pub struct RecordStore {
    repository: Arc<dyn RecordRepository>,
    records: Vec<Record>,
    version: u64,
    fingerprint: RecordSetFingerprint,
}

impl RecordStore {
    pub async fn open(repository: Arc<dyn RecordRepository>) -> Result<Self, StoreError> {
        let records = repository.load_all().await?;
        let fingerprint = RecordSetFingerprint::compute(0, &records);

        info!(event_name = "store.opened", records = records.len(), "record store loaded");

        Ok(Self { repository, records, version: 0, fingerprint })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fingerprint(&self) -> RecordSetFingerprint {
        self.fingerprint
    }

    /// Appends and persists the full set. On a failed write the in-memory append is undone.
    pub async fn append(&mut self, record: Record) -> Result<&[Record], StoreError> {
        record.validate()?;

        self.records.push(record);
        if let Err(error) = self.repository.save_all(&self.records).await {
            self.records.pop();
            warn!(
                event_name = "store.append.rolled_back",
                error = %error,
                records = self.records.len(),
                "append not persisted"
            );
            return Err(error.into());
        }

        self.version += 1;
        self.fingerprint = RecordSetFingerprint::compute(self.version, &self.records);

        info!(
            event_name = "store.record.appended",
            version = self.version,
            records = self.records.len(),
            "record appended"
        );

        Ok(&self.records)
    }

    /// Writes the current set again, e.g. to create the file with just a header.
    pub async fn persist(&self) -> Result<(), StoreError> {
        self.repository.save_all(&self.records).await?;
        Ok(())
    }
}
