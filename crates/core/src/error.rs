use crate::model::BedStatus;

/// Top-level error for core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown patient: {0}")]
    UnknownPatient(String),
    #[error(transparent)]
    Regulation(#[from] RegulationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("record error: {0}")]
    Records(#[from] leito_records::RecordError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Precondition violations of the regulation protocol. Never retried.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegulationError {
    #[error("patient {0} has no active regulation")]
    MissingActiveRegulation(String),
    #[error("concluding a regulation requires a transaction handle")]
    MissingTransaction,
}

/// Failures of the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("bed {bed_id} changed concurrently: expected {expected:?}, found {found:?}")]
    Conflict {
        bed_id: String,
        expected: BedStatus,
        found: BedStatus,
    },
    #[error("failed to create data directory: {0}")]
    DataDirCreation(std::io::Error),
    #[error("failed to read store file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write store file: {0}")]
    FileWrite(std::io::Error),
    #[error("store document error: {0}")]
    Records(#[from] leito_records::RecordError),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Infection lookup failures. Recovered locally by the normalization layer.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("infection catalogue unavailable: {0}")]
    Unavailable(String),
}
