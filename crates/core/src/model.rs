//! Canonical records consumed by the engines.
//!
//! Everything here has already been through the normalization layer: references are plain
//! ids, vocabularies are closed enums and timestamps are chrono values (or `None` when the
//! source value was unusable).

use chrono::{DateTime, NaiveDate, Utc};
use leito_types::fold;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// Vocabularies
// ============================================================================

/// Recorded sex of a patient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Intersex,
    Other,
}

impl Sex {
    /// Parse a recorded sex token after case and diacritic folding.
    ///
    /// Returns `None` for anything outside the known vocabulary.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "m" | "masculino" | "masc" => Some(Sex::Male),
            "f" | "feminino" | "fem" => Some(Sex::Female),
            "i" | "intersexo" => Some(Sex::Intersex),
            "o" | "outro" => Some(Sex::Other),
            _ => None,
        }
    }

    pub fn to_wire(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Intersex => "I",
            Sex::Other => "O",
        }
    }
}

/// Binary sex used by room cohorts and bed compatibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BinarySex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl BinarySex {
    pub fn as_str(self) -> &'static str {
        match self {
            BinarySex::Male => "M",
            BinarySex::Female => "F",
        }
    }
}

/// Bed status.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BedStatus {
    Vacant,
    Cleaning,
    Occupied,
    Regulated,
    /// Transient marker while a regulation towards this bed is being started.
    RegulationInProgress,
    /// Bed held for a patient arriving from another facility.
    ExternalReservation,
    /// Status text outside the known vocabulary, kept verbatim.
    Other(String),
}

impl BedStatus {
    pub fn from_wire(raw: &str) -> Self {
        match fold(raw).as_str() {
            "vago" | "livre" => BedStatus::Vacant,
            "higienizacao" | "em higienizacao" | "limpeza" => BedStatus::Cleaning,
            "ocupado" => BedStatus::Occupied,
            "regulado" => BedStatus::Regulated,
            "em regulacao" | "regulacao em andamento" => BedStatus::RegulationInProgress,
            "reservado" | "reserva externa" => BedStatus::ExternalReservation,
            _ => BedStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn to_wire(&self) -> &str {
        match self {
            BedStatus::Vacant => "Vago",
            BedStatus::Cleaning => "Higienização",
            BedStatus::Occupied => "Ocupado",
            BedStatus::Regulated => "Regulado",
            BedStatus::RegulationInProgress => "Em regulação",
            BedStatus::ExternalReservation => "Reserva externa",
            BedStatus::Other(raw) => raw,
        }
    }

    /// Vacant or Cleaning: the bed can receive a patient.
    pub fn is_assignable(&self) -> bool {
        matches!(self, BedStatus::Vacant | BedStatus::Cleaning)
    }

    /// Occupied or Regulated: the bed holds (or is about to hold) a room occupant.
    pub fn holds_occupant(&self) -> bool {
        matches!(self, BedStatus::Occupied | BedStatus::Regulated)
    }
}

/// Sector type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectorType {
    /// ENFERMARIA
    Ward,
    /// UTI
    Icu,
    /// Open emergency sector (PS), treated as an isolation-risk zone.
    Open,
    Other(String),
}

impl SectorType {
    /// Parse a sector type; `open_labels` are the folded labels that denote open sectors.
    pub fn from_wire(raw: &str, open_labels: &[String]) -> Self {
        let folded = fold(raw);
        match folded.as_str() {
            "enfermaria" => SectorType::Ward,
            "uti" => SectorType::Icu,
            _ if open_labels.iter().any(|label| fold(label) == folded) => SectorType::Open,
            _ => SectorType::Other(raw.trim().to_string()),
        }
    }

    pub fn to_wire(&self) -> &str {
        match self {
            SectorType::Ward => "Enfermaria",
            SectorType::Icu => "UTI",
            SectorType::Open => "PS",
            SectorType::Other(raw) => raw,
        }
    }

    pub fn serves(&self, care_level: CareLevel) -> bool {
        matches!(
            (self, care_level),
            (SectorType::Ward, CareLevel::Ward) | (SectorType::Icu, CareLevel::Icu)
        )
    }
}

/// Requested care level for a bed search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CareLevel {
    Ward,
    Icu,
}

impl std::str::FromStr for CareLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold(s).as_str() {
            "ward" | "enfermaria" => Ok(CareLevel::Ward),
            "icu" | "uti" => Ok(CareLevel::Icu),
            other => Err(format!("unknown care level: {other}")),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One isolation entry of a patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Isolation {
    pub infection_id: Option<String>,
    /// Status text as recorded.
    pub status: Option<String>,
    /// Status folds to "confirmado" or "suspeito".
    pub active: bool,
    pub acronym: Option<String>,
    pub name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Isolation {
    /// Upper-cased acronym, else name, else infection id.
    pub fn tag(&self) -> Option<String> {
        [&self.acronym, &self.name, &self.infection_id]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_uppercase)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveRegulation {
    pub origin_bed_id: Option<String>,
    pub origin_sector_id: Option<String>,
    pub destination_bed_id: Option<String>,
    pub destination_sector_id: Option<String>,
    /// `None` when the stored value was missing or unusable.
    pub started_at: Option<DateTime<Utc>>,
    pub patient_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IcuRequest {
    pub requested_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelocationRequest {
    pub reason: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: String,
    pub name: Option<String>,
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
    /// Sole source of truth for current placement.
    pub bed_id: Option<String>,
    pub sector_id: Option<String>,
    pub isolations: Vec<Isolation>,
    pub active_regulation: Option<ActiveRegulation>,
    pub icu_request: Option<IcuRequest>,
    pub relocation_request: Option<RelocationRequest>,
    /// Free-text origin sector tag recorded at intake.
    pub origin_sector: Option<String>,
}

impl Patient {
    /// Tags of the isolations currently counted as active.
    pub fn active_isolation_tags(&self) -> BTreeSet<String> {
        self.isolations
            .iter()
            .filter(|isolation| isolation.active)
            .filter_map(Isolation::tag)
            .collect()
    }

    pub fn has_active_isolation(&self) -> bool {
        self.isolations.iter().any(|isolation| isolation.active)
    }

    /// Name for audit text and reports; falls back to the regulation copy, then the id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| {
                self.active_regulation
                    .as_ref()
                    .and_then(|regulation| regulation.patient_name.as_deref())
            })
            .unwrap_or(&self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub status: BedStatus,
    pub at: Option<DateTime<Utc>>,
    pub patient_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bed {
    pub id: String,
    pub code: String,
    pub status: BedStatus,
    pub sector_id: Option<String>,
    pub room_id: Option<String>,
    /// Protected-care-pathway bed.
    pub protected_pathway: bool,
    pub history: Vec<StatusChange>,
}

impl Bed {
    /// First `len` characters of the bed code: the implicit room key in ward sectors.
    pub fn code_prefix(&self, len: usize) -> &str {
        let code = self.code.trim();
        match code.char_indices().nth(len) {
            Some((end, _)) => &code[..end],
            None => code,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Sector {
    pub id: String,
    pub name: String,
    pub acronym: Option<String>,
    pub kind: SectorType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: String,
    pub name: Option<String>,
    pub sector_id: Option<String>,
    /// Explicit members; empty for ward rooms grouped by code prefix.
    pub bed_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Infection {
    pub id: String,
    pub acronym: Option<String>,
    pub name: Option<String>,
}

/// Sex and isolation constraint imposed on the free beds of a shared room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CohortRestriction {
    pub sex: BinarySex,
    pub isolation_tags: BTreeSet<String>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Normalized view of every collection at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub patients: Vec<Patient>,
    pub beds: Vec<Bed>,
    pub sectors: Vec<Sector>,
    pub rooms: Vec<Room>,
    pub infections: Vec<Infection>,
}

impl Snapshot {
    pub fn index(&self) -> SnapshotIndex<'_> {
        SnapshotIndex::new(&self.patients, &self.beds, &self.sectors)
    }

    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|patient| patient.id == id)
    }

    pub fn bed(&self, id: &str) -> Option<&Bed> {
        self.beds.iter().find(|bed| bed.id == id)
    }

    pub fn sector(&self, id: &str) -> Option<&Sector> {
        self.sectors.iter().find(|sector| sector.id == id)
    }
}

/// Id lookups over borrowed collections.
///
/// Occupancy is derived from patients' bed ids; when two patients claim the same bed the
/// first one in collection order is the occupant.
#[derive(Debug)]
pub struct SnapshotIndex<'a> {
    beds: HashMap<&'a str, &'a Bed>,
    sectors: HashMap<&'a str, &'a Sector>,
    patients: HashMap<&'a str, &'a Patient>,
    occupants: HashMap<&'a str, &'a Patient>,
}

impl<'a> SnapshotIndex<'a> {
    pub fn new(patients: &'a [Patient], beds: &'a [Bed], sectors: &'a [Sector]) -> Self {
        let mut occupants: HashMap<&'a str, &'a Patient> = HashMap::new();
        for patient in patients {
            if let Some(bed_id) = patient.bed_id.as_deref() {
                if let Some(existing) = occupants.get(bed_id) {
                    tracing::debug!(
                        bed_id,
                        occupant = %existing.id,
                        ignored = %patient.id,
                        "bed claimed by more than one patient"
                    );
                    continue;
                }
                occupants.insert(bed_id, patient);
            }
        }

        Self {
            beds: beds.iter().map(|bed| (bed.id.as_str(), bed)).collect(),
            sectors: sectors
                .iter()
                .map(|sector| (sector.id.as_str(), sector))
                .collect(),
            patients: patients
                .iter()
                .map(|patient| (patient.id.as_str(), patient))
                .collect(),
            occupants,
        }
    }

    pub fn bed(&self, id: &str) -> Option<&'a Bed> {
        self.beds.get(id).copied()
    }

    pub fn sector(&self, id: &str) -> Option<&'a Sector> {
        self.sectors.get(id).copied()
    }

    pub fn patient(&self, id: &str) -> Option<&'a Patient> {
        self.patients.get(id).copied()
    }

    pub fn occupant(&self, bed_id: &str) -> Option<&'a Patient> {
        self.occupants.get(bed_id).copied()
    }

    pub fn bed_sector(&self, bed: &Bed) -> Option<&'a Sector> {
        bed.sector_id.as_deref().and_then(|id| self.sector(id))
    }

    /// Sector a patient is currently in: the bed's sector first, the recorded sector second.
    pub fn patient_sector(&self, patient: &Patient) -> Option<&'a Sector> {
        patient
            .bed_id
            .as_deref()
            .and_then(|bed_id| self.bed(bed_id))
            .and_then(|bed| self.bed_sector(bed))
            .or_else(|| patient.sector_id.as_deref().and_then(|id| self.sector(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sex_tokens_fold_accents_and_case() {
        assert_eq!(Sex::from_wire("M"), Some(Sex::Male));
        assert_eq!(Sex::from_wire("masc"), Some(Sex::Male));
        assert_eq!(Sex::from_wire(" Feminino "), Some(Sex::Female));
        assert_eq!(Sex::from_wire("INTERSEXO"), Some(Sex::Intersex));
        assert_eq!(Sex::from_wire("Outro"), Some(Sex::Other));
        assert_eq!(Sex::from_wire("x"), None);
        assert_eq!(Sex::from_wire(""), None);
    }

    #[test]
    fn bed_status_vocabulary() {
        assert_eq!(BedStatus::from_wire("Higienização"), BedStatus::Cleaning);
        assert_eq!(BedStatus::from_wire("higienizacao"), BedStatus::Cleaning);
        assert_eq!(BedStatus::from_wire("VAGO"), BedStatus::Vacant);
        assert_eq!(
            BedStatus::from_wire("Em Regulação"),
            BedStatus::RegulationInProgress
        );
        assert_eq!(
            BedStatus::from_wire(" Bloqueado "),
            BedStatus::Other("Bloqueado".into())
        );
    }

    #[test]
    fn bed_status_wire_round_trip() {
        for status in [
            BedStatus::Vacant,
            BedStatus::Cleaning,
            BedStatus::Occupied,
            BedStatus::Regulated,
            BedStatus::RegulationInProgress,
            BedStatus::ExternalReservation,
            BedStatus::Other("Bloqueado".into()),
        ] {
            assert_eq!(BedStatus::from_wire(status.to_wire()), status);
        }
    }

    #[test]
    fn sector_type_uses_open_labels() {
        let open = vec!["ps".to_string(), "pronto socorro".to_string()];
        assert_eq!(SectorType::from_wire("ENFERMARIA", &open), SectorType::Ward);
        assert_eq!(SectorType::from_wire("UTI", &open), SectorType::Icu);
        assert_eq!(SectorType::from_wire("Pronto Socorro", &open), SectorType::Open);
        assert_eq!(
            SectorType::from_wire("Centro Cirúrgico", &open),
            SectorType::Other("Centro Cirúrgico".into())
        );
    }

    #[test]
    fn isolation_tag_prefers_acronym() {
        let mut isolation = Isolation {
            infection_id: Some("inf-1".into()),
            status: Some("Confirmado".into()),
            active: true,
            acronym: Some("mrsa".into()),
            name: Some("Staphylococcus aureus".into()),
            started_at: None,
        };
        assert_eq!(isolation.tag().as_deref(), Some("MRSA"));

        isolation.acronym = Some("  ".into());
        assert_eq!(isolation.tag().as_deref(), Some("STAPHYLOCOCCUS AUREUS"));

        isolation.name = None;
        assert_eq!(isolation.tag().as_deref(), Some("INF-1"));
    }

    #[test]
    fn code_prefix_is_char_safe() {
        let bed = Bed {
            id: "b".into(),
            code: "Ç01-A".into(),
            status: BedStatus::Vacant,
            sector_id: None,
            room_id: None,
            protected_pathway: false,
            history: vec![],
        };
        assert_eq!(bed.code_prefix(3), "Ç01");
        assert_eq!(bed.code_prefix(10), "Ç01-A");
    }
}
