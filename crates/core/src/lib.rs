//! # Leito Core
//!
//! Core business logic for hospital bed management.
//!
//! This crate contains pure derivations over a normalized snapshot of the document store,
//! plus the persistence seam they are applied through:
//! - normalization of raw documents into canonical records (`normalize`)
//! - room cohort restrictions (`cohort`) and bed compatibility (`compatibility`)
//! - contamination-risk detection (`risk`) and occupancy indicators (`occupancy`)
//! - the regulation transition protocol (`regulation`) staged on a write batch
//! - in-memory and file-backed stores (`store`) and the service tying them together
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and
//! `cli`.

pub mod audit;
pub mod cohort;
pub mod compatibility;
pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod normalize;
pub mod occupancy;
pub mod regulation;
pub mod risk;
pub mod rooms;
pub mod service;
pub mod store;
pub mod temporal;

pub use audit::AuditEntry;
pub use cohort::{derive_restrictions, room_restriction};
pub use compatibility::{explain_bed, find_compatible_beds, CompatibilityResolver, Rejection};
pub use config::{ConfigValues, CoreConfig};
pub use error::{CatalogError, CoreError, CoreResult, RegulationError, StoreError, StoreResult};
pub use model::{
    Bed, BedStatus, BinarySex, CareLevel, CohortRestriction, Patient, Sector, SectorType, Sex,
    Snapshot,
};
pub use normalize::{
    cohort_sex, compatibility_sex, normalize_collections, InfectionCatalog, InfectionTable,
    Normalizer, RawCollections,
};
pub use occupancy::{summarize, OccupancySummary, SectorOccupancy};
pub use regulation::{conclude_regulation, ConcludeRequest, RegulationOutcome, WriteBatch};
pub use risk::{detect_risks, RiskDetail, RiskReason, RiskReport};
pub use service::{BedAssessment, BedService};
pub use store::{FileStore, MemoryStore, StagedWrites, Store};
