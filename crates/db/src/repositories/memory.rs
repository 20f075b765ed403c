use tokio::sync::RwLock;

use sekretarz_core::domain::record::Record;

use super::{RecordRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryRecordRepository {
    records: RwLock<Vec<Record>>,
}

impl InMemoryRecordRepository {
    pub fn with_records(records: Vec<Record>) -> Self {
        Self { records: RwLock::new(records) }
    }
}

#[async_trait::async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn load_all(&self) -> Result<Vec<Record>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.clone())
    }

    async fn save_all(&self, records: &[Record]) -> Result<(), RepositoryError> {
        let mut stored = self.records.write().await;
        *stored = records.to_vec();
        Ok(())
    }
}
