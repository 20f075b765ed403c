use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("record is missing a client name (Klient)")]
    MissingClientName,
    #[error("unknown project status `{0}` (expected Planowany|W Trakcie|Zakończony|Pytanie)")]
    UnknownProjectStatus(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("startup configuration failure: {0}")]
    StartupConfig(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("knowledge base has no data")]
    DataAbsent,
    #[error("reasoning did not converge within {limit} tool iterations")]
    ToolIterationExceeded { limit: usize },
}

/// How an error travels once raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// Halts the operation (or the process at startup).
    Fatal,
    /// Rejects the caller's input; the session continues unchanged.
    Reject,
    /// Becomes a user-visible message; the session stays usable.
    Degrade,
}

impl ApplicationError {
    pub fn propagation(&self) -> Propagation {
        match self {
            Self::StartupConfig(_) | Self::Persistence(_) => Propagation::Fatal,
            Self::Domain(_) => Propagation::Reject,
            Self::Integration(_) | Self::DataAbsent | Self::ToolIterationExceeded { .. } => {
                Propagation::Degrade
            }
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "validation",
            Self::StartupConfig(_) => "config_validation",
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::DataAbsent => "data_absent",
            Self::ToolIterationExceeded { .. } => "tool_iteration_exceeded",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) => "The record could not be accepted. Check the fields and try again.",
            Self::StartupConfig(_) => {
                "The assistant is not configured. Set the API key and restart."
            }
            Self::Persistence(_) => {
                "The record could not be saved. Nothing was added; check the data file path."
            }
            Self::Integration(_) => "The language model is temporarily unavailable.",
            Self::DataAbsent => "The knowledge base is empty. Add a client record first.",
            Self::ToolIterationExceeded { .. } => {
                "The assistant could not finish this request. Try rephrasing the question."
            }
        }
    }
}
