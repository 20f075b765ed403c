use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Column names of the persisted store, in their fixed order.
pub const RECORD_HEADER: [&str; 5] = ["Klient", "Kraj", "Produkt", "StatusProjektu", "Feedback"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[serde(rename = "Planowany", alias = "Planned")]
    Planned,
    #[serde(rename = "W Trakcie", alias = "InProgress")]
    InProgress,
    #[serde(rename = "Zakończony", alias = "Done")]
    Done,
    #[serde(rename = "Pytanie", alias = "Question")]
    Question,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 4] = [Self::Planned, Self::InProgress, Self::Done, Self::Question];

    /// Label written to the store and shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Planned => "Planowany",
            Self::InProgress => "W Trakcie",
            Self::Done => "Zakończony",
            Self::Question => "Pytanie",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "planowany" | "planned" => Ok(Self::Planned),
            "w trakcie" | "inprogress" | "in progress" => Ok(Self::InProgress),
            "zakończony" | "zakonczony" | "done" => Ok(Self::Done),
            "pytanie" | "question" => Ok(Self::Question),
            _ => Err(DomainError::UnknownProjectStatus(value.to_string())),
        }
    }
}

/// One customer feedback entry. Field order matches [`RECORD_HEADER`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Klient")]
    pub client: String,
    #[serde(rename = "Kraj")]
    pub country: String,
    #[serde(rename = "Produkt")]
    pub product: String,
    #[serde(rename = "StatusProjektu")]
    pub status: ProjectStatus,
    #[serde(rename = "Feedback")]
    pub feedback: String,
}

impl Record {
    pub fn new(
        client: impl Into<String>,
        country: impl Into<String>,
        product: impl Into<String>,
        status: ProjectStatus,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            country: country.into(),
            product: product.into(),
            status,
            feedback: feedback.into(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.client.trim().is_empty() {
            return Err(DomainError::MissingClientName);
        }
        Ok(())
    }

    /// JSON object keyed by the store's column names, used as the record's context text.
    pub fn to_document_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "Klient: {}; Kraj: {}; Produkt: {}; StatusProjektu: {}; Feedback: {}",
                self.client, self.country, self.product, self.status, self.feedback
            )
        })
    }
}

/// Identity of a record set as seen by derived structures such as the retrieval index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordSetFingerprint {
    pub version: u64,
    pub len: usize,
    pub digest: [u8; 32],
}

impl RecordSetFingerprint {
    pub fn compute(version: u64, records: &[Record]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for record in records {
            for field in [
                record.client.as_str(),
                record.country.as_str(),
                record.product.as_str(),
                record.status.label(),
                record.feedback.as_str(),
            ] {
                hasher.update(&(field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
        }

        Self { version, len: records.len(), digest: *hasher.finalize().as_bytes() }
    }
}
