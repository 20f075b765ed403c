use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use sekretarz_core::domain::record::Record;

use super::{RecordRepository, RepositoryError};
use crate::codec::{decode_records, encode_records};

/// Record set stored as a UTF-8 CSV file. A missing file reads as an empty store.
pub struct CsvRecordRepository {
    path: PathBuf,
}

impl CsvRecordRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RecordRepository for CsvRecordRepository {
    async fn load_all(&self) -> Result<Vec<Record>, RepositoryError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => decode_records(&bytes),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(RepositoryError::Io { path: self.path.clone(), source }),
        }
    }

    async fn save_all(&self, records: &[Record]) -> Result<(), RepositoryError> {
        let bytes = encode_records(records)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes)).await.map_err(
            |join_error| RepositoryError::Io {
                path: self.path.clone(),
                source: io::Error::other(join_error.to_string()),
            },
        )?
    }
}

// Temp file lives in the target directory so the final rename stays on one filesystem.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), RepositoryError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_error = |source: io::Error| RepositoryError::Io { path: path.to_path_buf(), source };

    let mut temp = NamedTempFile::new_in(&parent).map_err(io_error)?;
    // Temp files start as 0600; the replaced file keeps its own mode.
    match std::fs::metadata(path) {
        Ok(existing) => temp.as_file().set_permissions(existing.permissions()).map_err(io_error)?,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(io_error(source)),
    }
    temp.write_all(bytes).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|error| io_error(error.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use sekretarz_core::domain::record::{ProjectStatus, Record};

    use crate::repositories::{CsvRecordRepository, RecordRepository, RepositoryError};

    fn acme() -> Record {
        Record::new("Acme", "PL", "Widget", ProjectStatus::InProgress, "Dostawa opóźniona")
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_store() {
        let dir = TempDir::new().expect("tempdir");
        let repo = CsvRecordRepository::new(dir.path().join("data.csv"));

        assert!(repo.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_and_leaves_no_temp_files() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data.csv");
        let repo = CsvRecordRepository::new(&path);
        let records = vec![acme(), Record::new("Beta", "DE", "Gadget", ProjectStatus::Done, "")];

        repo.save_all(&records).await.expect("save");

        assert_eq!(repo.load_all().await.expect("load"), records);
        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("data.csv")]);
    }

    #[tokio::test]
    async fn unwritable_target_reports_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let repo = CsvRecordRepository::new(dir.path().join("missing").join("data.csv"));

        let error = repo.save_all(&[acme()]).await.expect_err("save should fail");

        assert!(matches!(error, RepositoryError::Io { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn save_keeps_permissions_of_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data.csv");
        fs::write(&path, "Klient,Kraj,Produkt,StatusProjektu,Feedback\n").expect("write fixture");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        let repo = CsvRecordRepository::new(&path);
        repo.save_all(&[acme()]).await.expect("save");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(repo.load_all().await.expect("load"), vec![acme()]);
    }

    #[tokio::test]
    async fn file_written_by_other_tools_is_readable() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data.csv");
        fs::write(
            &path,
            "Klient,Kraj,Produkt,StatusProjektu,Feedback\nAcme,PL,Widget,W Trakcie,Dostawa opóźniona\n",
        )
        .expect("write fixture");

        let repo = CsvRecordRepository::new(&path);

        assert_eq!(repo.load_all().await.expect("load"), vec![acme()]);
    }
}
