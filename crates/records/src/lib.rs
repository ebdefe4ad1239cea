//! Wire/boundary support for the bed-management document store.
//!
//! This crate provides **wire models** and **format helpers** for the documents exchanged
//! with the external store (patients, beds, sectors, rooms, infections, regulation history
//! and audit lines).
//!
//! This crate focuses on:
//! - serialisation/deserialisation in JSON
//! - flattening embedded references to plain ids at the boundary
//! - field-path error reporting when a document does not match the schema
//!
//! Interpretation (sex codes, status vocabularies, timestamps as instants) is left to the
//! core; this crate only guarantees the shapes.

pub mod collection;
pub mod documents;
pub mod reference;
pub mod timestamp;

pub use collection::Collection;
pub use documents::{
    AuditDocument, BedDocument, Document, IcuRequestDocument, InfectionDocument,
    IsolationDocument, PatientDocument, RegulationDocument, RegulationHistoryDocument,
    RelocationRequestDocument, RoomDocument, SectorDocument, StatusChangeDocument,
};
pub use reference::Reference;
pub use timestamp::WireTimestamp;

/// Errors returned by the `records` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`RecordError`].
pub type RecordResult<T> = Result<T, RecordError>;
