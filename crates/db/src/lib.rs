pub mod codec;
pub mod repositories;
pub mod store;

pub use repositories::{
    CsvRecordRepository, InMemoryRecordRepository, RecordRepository, RepositoryError,
};
pub use store::{RecordStore, StoreError};
