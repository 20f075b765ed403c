//! CSV encoding of the record store.
//!
//! The header row is always written, including for an empty store. Columns are
//! matched by name on decode so hand-edited files with reordered columns still load.
//! A column outside the record schema is rejected: the next save would drop it.

use sekretarz_core::domain::record::{ProjectStatus, Record, RECORD_HEADER};

use crate::repositories::RepositoryError;

pub fn encode_records(records: &[Record]) -> Result<Vec<u8>, RepositoryError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(RECORD_HEADER).map_err(encode_error)?;

    for record in records {
        writer
            .write_record([
                record.client.as_str(),
                record.country.as_str(),
                record.product.as_str(),
                record.status.label(),
                record.feedback.as_str(),
            ])
            .map_err(encode_error)?;
    }

    writer.into_inner().map_err(|error| RepositoryError::Encode(error.to_string()))
}

pub fn decode_records(bytes: &[u8]) -> Result<Vec<Record>, RepositoryError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|error| RepositoryError::Decode { line: 1, message: error.to_string() })?
        .clone();

    if let Some(extra) =
        headers.iter().map(str::trim).find(|header| !RECORD_HEADER.iter().any(|name| name == header))
    {
        return Err(RepositoryError::Decode {
            line: 1,
            message: format!(
                "unexpected column `{extra}`; the store only keeps {}",
                RECORD_HEADER.join(",")
            ),
        });
    }

    let mut columns = [0usize; 5];
    for (slot, name) in columns.iter_mut().zip(RECORD_HEADER) {
        *slot = headers.iter().position(|header| header.trim() == name).ok_or_else(|| {
            RepositoryError::Decode { line: 1, message: format!("missing column `{name}`") }
        })?;
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|error| RepositoryError::Decode {
            line: error.position().map(|position| position.line()).unwrap_or(0),
            message: error.to_string(),
        })?;
        let line = row.position().map(|position| position.line()).unwrap_or(0);
        let field = |index: usize| row.get(columns[index]).unwrap_or_default().to_string();

        let status = field(3).parse::<ProjectStatus>().map_err(|error| {
            RepositoryError::Decode { line, message: error.to_string() }
        })?;

        records.push(Record {
            client: field(0),
            country: field(1),
            product: field(2),
            status,
            feedback: field(4),
        });
    }

    Ok(records)
}

fn encode_error(error: csv::Error) -> RepositoryError {
    RepositoryError::Encode(error.to_string())
}
