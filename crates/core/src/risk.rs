//! Contamination-risk detector.
//!
//! Flags isolated patients lying in open emergency sectors or sharing a room with someone
//! outside their isolation cohort.

use crate::config::CoreConfig;
use crate::model::{Bed, Patient, Room, Sector, SectorType, SnapshotIndex};
use crate::rooms::RoomIndex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskReason {
    OpenSector,
    MissingCohort,
    CohortMismatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RiskDetail {
    pub reason: RiskReason,
    /// Sector name for open-sector risks, room label otherwise.
    pub location: String,
    pub companion_id: Option<String>,
    pub companion_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RiskReport {
    pub reasons: BTreeSet<RiskReason>,
    pub details: Vec<RiskDetail>,
}

impl RiskReport {
    fn push(&mut self, detail: RiskDetail) {
        self.reasons.insert(detail.reason);
        self.details.push(detail);
    }
}

/// Risk reports keyed by patient id. Patients without risks are absent.
pub fn detect_risks(
    patients: &[Patient],
    beds: &[Bed],
    rooms: &[Room],
    sectors: &[Sector],
    cfg: &CoreConfig,
) -> HashMap<String, RiskReport> {
    let index = SnapshotIndex::new(patients, beds, sectors);
    let room_index = RoomIndex::new(cfg, beds, rooms, sectors);
    let mut reports: HashMap<String, RiskReport> = HashMap::new();

    for patient in patients.iter().filter(|p| p.has_active_isolation()) {
        if let Some(sector) = index.patient_sector(patient) {
            if sector.kind == SectorType::Open {
                reports.entry(patient.id.clone()).or_default().push(RiskDetail {
                    reason: RiskReason::OpenSector,
                    location: sector.name.clone(),
                    companion_id: None,
                    companion_name: None,
                });
            }
        }

        let Some(bed_id) = patient.bed_id.as_deref() else {
            continue;
        };
        // Only the recorded occupant speaks for a bed.
        if index.occupant(bed_id).map(|occupant| &occupant.id) != Some(&patient.id) {
            continue;
        }
        let Some(room) = room_index.room_of(bed_id) else {
            continue;
        };
        let location = room_index.label(room);
        let tags = patient.active_isolation_tags();

        for companion in room_index
            .companions_of(bed_id)
            .into_iter()
            .filter_map(|bed| index.occupant(&bed.id))
        {
            if !companion.has_active_isolation() {
                for (flagged, other) in [(patient, companion), (companion, patient)] {
                    reports.entry(flagged.id.clone()).or_default().push(RiskDetail {
                        reason: RiskReason::MissingCohort,
                        location: location.clone(),
                        companion_id: Some(other.id.clone()),
                        companion_name: Some(other.display_name().to_string()),
                    });
                }
            } else if companion.active_isolation_tags() != tags {
                reports.entry(patient.id.clone()).or_default().push(RiskDetail {
                    reason: RiskReason::CohortMismatch,
                    location: location.clone(),
                    companion_id: Some(companion.id.clone()),
                    companion_name: Some(companion.display_name().to_string()),
                });
            }
        }
    }

    if !reports.is_empty() {
        tracing::debug!(flagged = reports.len(), "contamination risks detected");
    }
    reports
}

/// Reports paired with their patient, ordered by display name for presentation.
pub fn ordered_by_name<'a>(
    reports: &'a HashMap<String, RiskReport>,
    patients: &'a [Patient],
) -> Vec<(&'a Patient, &'a RiskReport)> {
    let mut ordered: Vec<_> = patients
        .iter()
        .filter_map(|patient| Some((patient, reports.get(&patient.id)?)))
        .collect();
    ordered.sort_by(|(a, _), (b, _)| {
        a.display_name()
            .to_lowercase()
            .cmp(&b.display_name().to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}
