//! Bed-compatibility resolver.
//!
//! Rules, in evaluation order:
//! 1. the bed is Vacant or Cleaning
//! 2. the bed's sector serves the requested care level
//! 3. ICU requests stop here
//! 4. ward requests also check the protected-care-pathway rule and the room-cohort rule
//!
//! [`CompatibilityResolver::explain`] reports the first failing rule for one bed; the
//! candidate list is every bed for which it reports nothing, in snapshot order.

use crate::config::CoreConfig;
use crate::model::{Bed, BinarySex, CareLevel, Patient, Snapshot, SnapshotIndex};
use crate::normalize::compatibility_sex;
use crate::rooms::RoomIndex;
use crate::temporal::age_on;
use chrono::NaiveDate;
use leito_types::fold_eq;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Why a bed cannot take the target patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum Rejection {
    NotAssignable { status: String },
    SectorMismatch { care_level: CareLevel },
    ProtectedPathwayAge { age: u32, min: u32, max: u32 },
    ProtectedPathwayIsolation,
    ProtectedPathwayOrigin { origin_sector: String },
    RoomSexMismatch { room_sex: BinarySex },
    RoomIsolationMismatch {
        room_tags: BTreeSet<String>,
        patient_tags: BTreeSet<String>,
    },
    IsolatedIntoCleanRoom,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAssignable { status } => write!(f, "bed status {status} is not free"),
            Rejection::SectorMismatch { care_level } => {
                write!(f, "sector does not serve {care_level:?} care")
            }
            Rejection::ProtectedPathwayAge { age, min, max } => write!(
                f,
                "protected pathway bed requires age {min}..={max}, patient is {age}"
            ),
            Rejection::ProtectedPathwayIsolation => {
                write!(f, "protected pathway bed cannot take an isolated patient")
            }
            Rejection::ProtectedPathwayOrigin { origin_sector } => write!(
                f,
                "protected pathway bed cannot take a patient from {origin_sector}"
            ),
            Rejection::RoomSexMismatch { room_sex } => {
                write!(f, "room is occupied by sex {}", room_sex.as_str())
            }
            Rejection::RoomIsolationMismatch {
                room_tags,
                patient_tags,
            } => write!(
                f,
                "room isolation {room_tags:?} differs from patient isolation {patient_tags:?}"
            ),
            Rejection::IsolatedIntoCleanRoom => {
                write!(f, "isolated patient cannot join a room without isolation")
            }
        }
    }
}

/// Evaluates beds for one target patient against one snapshot.
pub struct CompatibilityResolver<'a> {
    cfg: &'a CoreConfig,
    index: SnapshotIndex<'a>,
    rooms: RoomIndex<'a>,
    target: &'a Patient,
    care_level: CareLevel,
    age: u32,
    target_sex: BinarySex,
    target_tags: BTreeSet<String>,
}

impl<'a> CompatibilityResolver<'a> {
    pub fn new(
        cfg: &'a CoreConfig,
        snapshot: &'a Snapshot,
        target: &'a Patient,
        care_level: CareLevel,
        today: NaiveDate,
    ) -> Self {
        Self {
            cfg,
            index: snapshot.index(),
            rooms: RoomIndex::new(cfg, &snapshot.beds, &snapshot.rooms, &snapshot.sectors),
            target,
            care_level,
            age: age_on(target.birth_date, today),
            target_sex: compatibility_sex(target.sex),
            target_tags: target.active_isolation_tags(),
        }
    }

    /// First rule `bed` fails for the target, or `None` when the bed is compatible.
    pub fn explain(&self, bed: &Bed) -> Option<Rejection> {
        if !bed.status.is_assignable() {
            return Some(Rejection::NotAssignable {
                status: bed.status.to_wire().to_string(),
            });
        }

        let serves = self
            .index
            .bed_sector(bed)
            .is_some_and(|sector| sector.kind.serves(self.care_level));
        if !serves {
            return Some(Rejection::SectorMismatch {
                care_level: self.care_level,
            });
        }

        if self.care_level == CareLevel::Icu {
            return None;
        }

        if bed.protected_pathway {
            if let Some(rejection) = self.protected_pathway() {
                return Some(rejection);
            }
        }

        self.room_cohort(bed)
    }

    pub fn compatible<'b>(&self, beds: &'b [Bed]) -> Vec<&'b Bed> {
        beds.iter()
            .filter(|bed| self.explain(bed).is_none())
            .collect()
    }

    fn protected_pathway(&self) -> Option<Rejection> {
        let (min, max) = (self.cfg.protected_min_age(), self.cfg.protected_max_age());
        if self.age < min || self.age > max {
            return Some(Rejection::ProtectedPathwayAge {
                age: self.age,
                min,
                max,
            });
        }

        if self.target.has_active_isolation() {
            return Some(Rejection::ProtectedPathwayIsolation);
        }

        let origin = self.target.origin_sector.as_deref().unwrap_or_default();
        if !origin.is_empty() && fold_eq(origin, self.cfg.surgical_recovery_origin()) {
            return Some(Rejection::ProtectedPathwayOrigin {
                origin_sector: origin.to_string(),
            });
        }

        None
    }

    fn room_cohort(&self, bed: &Bed) -> Option<Rejection> {
        let occupants: Vec<&Patient> = self
            .rooms
            .companions_of(&bed.id)
            .into_iter()
            .filter_map(|companion| self.index.occupant(&companion.id))
            .filter(|occupant| occupant.id != self.target.id)
            .collect();

        if occupants.is_empty() {
            return (!self.target_tags.is_empty()).then_some(Rejection::IsolatedIntoCleanRoom);
        }

        let sexes: BTreeSet<BinarySex> = occupants
            .iter()
            .map(|occupant| compatibility_sex(occupant.sex))
            .collect();
        if let (1, Some(&room_sex)) = (sexes.len(), sexes.first()) {
            if room_sex != self.target_sex {
                return Some(Rejection::RoomSexMismatch { room_sex });
            }
        }

        let room_tags: BTreeSet<String> = occupants
            .iter()
            .flat_map(|occupant| occupant.active_isolation_tags())
            .collect();

        if room_tags.is_empty() {
            return (!self.target_tags.is_empty()).then_some(Rejection::IsolatedIntoCleanRoom);
        }

        (room_tags != self.target_tags).then(|| Rejection::RoomIsolationMismatch {
            room_tags,
            patient_tags: self.target_tags.clone(),
        })
    }
}

/// Beds the target may take at the requested care level, in snapshot order.
pub fn find_compatible_beds<'a>(
    cfg: &CoreConfig,
    snapshot: &'a Snapshot,
    target: &Patient,
    care_level: CareLevel,
    today: NaiveDate,
) -> Vec<&'a Bed> {
    let resolver = CompatibilityResolver::new(cfg, snapshot, target, care_level, today);
    let beds = resolver.compatible(&snapshot.beds);
    tracing::debug!(
        patient_id = %target.id,
        ?care_level,
        candidates = beds.len(),
        "resolved compatible beds"
    );
    beds
}

/// First failing rule for one bed, or `None` when it is compatible.
pub fn explain_bed(
    cfg: &CoreConfig,
    snapshot: &Snapshot,
    target: &Patient,
    bed: &Bed,
    care_level: CareLevel,
    today: NaiveDate,
) -> Option<Rejection> {
    CompatibilityResolver::new(cfg, snapshot, target, care_level, today).explain(bed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::fixtures::*;
    use crate::model::{BedStatus, SectorType, Sex};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
    }

    fn born_years_ago(years: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024 - years, 6, 15)
    }

    fn ids(beds: Vec<&Bed>) -> Vec<&str> {
        beds.into_iter().map(|bed| bed.id.as_str()).collect()
    }

    fn mixed_snapshot() -> Snapshot {
        Snapshot {
            patients: vec![],
            beds: vec![
                bed("u1", "UTI-01", "UTI", BedStatus::Vacant),
                bed("u2", "UTI-02", "UTI", BedStatus::Cleaning),
                bed("u3", "UTI-03", "UTI", BedStatus::Occupied),
                bed("w1", "201A", "ENF", BedStatus::Vacant),
                bed("w2", "202A", "ENF", BedStatus::Vacant),
            ],
            sectors: vec![sector("UTI", SectorType::Icu), sector("ENF", SectorType::Ward)],
            rooms: vec![],
            infections: vec![],
        }
    }

    #[test]
    fn icu_requests_bypass_cohort_rules() {
        let snapshot = mixed_snapshot();
        let cfg = CoreConfig::default();

        let mut target = patient("t", Some(Sex::Male), None, &["MRSA", "KPC"]);
        target.origin_sector = Some("CC - Recuperação".into());

        let beds = find_compatible_beds(&cfg, &snapshot, &target, CareLevel::Icu, today());
        assert_eq!(ids(beds), vec!["u1", "u2"]);
    }

    #[test]
    fn ward_requests_only_see_ward_beds() {
        let snapshot = mixed_snapshot();
        let target = patient("t", Some(Sex::Female), None, &[]);
        let beds = find_compatible_beds(
            &CoreConfig::default(),
            &snapshot,
            &target,
            CareLevel::Ward,
            today(),
        );
        assert_eq!(ids(beds), vec!["w1", "w2"]);
    }

    #[test]
    fn mrsa_room_admits_only_matching_cohort() {
        let snapshot = mrsa_room();
        let cfg = CoreConfig::default();

        let male = patient("y", Some(Sex::Male), None, &[]);
        assert!(find_compatible_beds(&cfg, &snapshot, &male, CareLevel::Ward, today()).is_empty());

        let matching = patient("z", Some(Sex::Female), None, &["MRSA"]);
        let beds = find_compatible_beds(&cfg, &snapshot, &matching, CareLevel::Ward, today());
        assert_eq!(ids(beds), vec!["102", "103"]);

        let clean_female = patient("c", Some(Sex::Female), None, &[]);
        let bed = &snapshot.beds[1];
        assert!(matches!(
            explain_bed(&cfg, &snapshot, &clean_female, bed, CareLevel::Ward, today()),
            Some(Rejection::RoomIsolationMismatch { .. })
        ));

        let superset = patient("s", Some(Sex::Female), None, &["MRSA", "VRE"]);
        assert!(find_compatible_beds(&cfg, &snapshot, &superset, CareLevel::Ward, today())
            .is_empty());
    }

    #[test]
    fn unknown_sex_is_treated_as_female() {
        let snapshot = mrsa_room();
        let target = patient("u", None, None, &["MRSA"]);
        let beds = find_compatible_beds(
            &CoreConfig::default(),
            &snapshot,
            &target,
            CareLevel::Ward,
            today(),
        );
        assert_eq!(beds.len(), 2);
    }

    #[test]
    fn isolated_patient_cannot_enter_clean_room() {
        let snapshot = mixed_snapshot();
        let target = patient("t", Some(Sex::Female), None, &["VRE"]);
        let cfg = CoreConfig::default();
        assert_eq!(
            explain_bed(&cfg, &snapshot, &target, &snapshot.beds[3], CareLevel::Ward, today()),
            Some(Rejection::IsolatedIntoCleanRoom)
        );
    }

    #[test]
    fn target_is_not_its_own_roommate() {
        let mut snapshot = mrsa_room();
        snapshot.patients[0].bed_id = None;
        snapshot
            .patients
            .push(patient("t", Some(Sex::Male), Some("101"), &[]));

        let target = snapshot.patients[1].clone();
        let beds = find_compatible_beds(
            &CoreConfig::default(),
            &snapshot,
            &target,
            CareLevel::Ward,
            today(),
        );
        assert_eq!(ids(beds), vec!["102", "103"]);
    }

    fn protected_snapshot() -> Snapshot {
        let mut protected = bed("p1", "301A", "ENF", BedStatus::Vacant);
        protected.protected_pathway = true;
        Snapshot {
            patients: vec![],
            beds: vec![protected],
            sectors: vec![sector("ENF", SectorType::Ward)],
            rooms: vec![],
            infections: vec![],
        }
    }

    #[test]
    fn protected_pathway_age_bounds_are_inclusive() {
        let snapshot = protected_snapshot();
        let cfg = CoreConfig::default();

        for (age, admitted) in [(17, false), (18, true), (60, true), (61, false)] {
            let mut target = patient("t", Some(Sex::Female), None, &[]);
            target.birth_date = born_years_ago(age);
            let beds = find_compatible_beds(&cfg, &snapshot, &target, CareLevel::Ward, today());
            assert_eq!(beds.len() == 1, admitted, "age {age}");
        }
    }

    #[test]
    fn unparseable_birth_date_excludes_from_protected_beds() {
        let snapshot = protected_snapshot();
        let target = patient("t", Some(Sex::Female), None, &[]);
        assert_eq!(
            explain_bed(
                &CoreConfig::default(),
                &snapshot,
                &target,
                &snapshot.beds[0],
                CareLevel::Ward,
                today()
            ),
            Some(Rejection::ProtectedPathwayAge {
                age: 0,
                min: 18,
                max: 60
            })
        );
    }

    #[test]
    fn protected_pathway_rejects_isolation_and_surgical_recovery() {
        let snapshot = protected_snapshot();
        let cfg = CoreConfig::default();

        let mut isolated = patient("i", Some(Sex::Female), None, &["MRSA"]);
        isolated.birth_date = born_years_ago(40);
        assert_eq!(
            explain_bed(&cfg, &snapshot, &isolated, &snapshot.beds[0], CareLevel::Ward, today()),
            Some(Rejection::ProtectedPathwayIsolation)
        );

        for origin in ["CC - Recuperação", "cc - recuperacao", " CC - RECUPERACAO "] {
            let mut target = patient("o", Some(Sex::Female), None, &[]);
            target.birth_date = born_years_ago(40);
            target.origin_sector = Some(origin.into());
            let bed = &snapshot.beds[0];
            let rejection = explain_bed(&cfg, &snapshot, &target, bed, CareLevel::Ward, today());
            assert!(
                matches!(rejection, Some(Rejection::ProtectedPathwayOrigin { .. })),
                "origin {origin}"
            );
        }

        let mut other_origin = patient("o", Some(Sex::Female), None, &[]);
        other_origin.birth_date = born_years_ago(40);
        other_origin.origin_sector = Some("Pronto Socorro".into());
        assert_eq!(
            find_compatible_beds(&cfg, &snapshot, &other_origin, CareLevel::Ward, today()).len(),
            1
        );
    }

    /// The published restriction ignores unknown sexes while the resolver counts them as
    /// female, so a mixed room stays open to both sexes even though it shows "M".
    #[test]
    fn unknown_sex_occupant_splits_published_and_resolved_cohort() {
        let snapshot = Snapshot {
            patients: vec![
                patient("u", None, Some("101"), &[]),
                patient("m", Some(Sex::Male), Some("102"), &[]),
            ],
            beds: vec![
                bed("101", "10A-1", "ENF", BedStatus::Occupied),
                bed("102", "10A-2", "ENF", BedStatus::Occupied),
                bed("103", "10A-3", "ENF", BedStatus::Vacant),
            ],
            sectors: vec![sector("ENF", SectorType::Ward)],
            rooms: vec![],
            infections: vec![],
        };
        let cfg = CoreConfig::default();

        let restrictions = crate::cohort::derive_restrictions(&snapshot, &cfg);
        assert_eq!(restrictions.get("103").map(|r| r.sex), Some(BinarySex::Male));

        let female = patient("f", Some(Sex::Female), None, &[]);
        let beds = find_compatible_beds(&cfg, &snapshot, &female, CareLevel::Ward, today());
        assert_eq!(ids(beds), vec!["103"]);

        let male = patient("y", Some(Sex::Male), None, &[]);
        let beds = find_compatible_beds(&cfg, &snapshot, &male, CareLevel::Ward, today());
        assert_eq!(ids(beds), vec!["103"]);
    }
}
