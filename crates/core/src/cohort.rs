//! Isolation/cohort engine.
//!
//! A shared room whose occupants agree on sex imposes that sex, plus the union of their
//! active isolation tags, on every free bed of the room. Restrictions are derived on each
//! read and never persisted.

use crate::config::CoreConfig;
use crate::model::{Bed, CohortRestriction, Patient, Snapshot, SnapshotIndex};
use crate::normalize::cohort_sex;
use crate::rooms::RoomIndex;
use std::collections::{BTreeSet, HashMap};

/// Restriction imposed by the occupied beds of one room.
///
/// Only beds that are Occupied or Regulated and have a resolvable occupant count. Occupants
/// whose sex cannot be determined do not vote; if nobody votes, or the votes disagree, there
/// is no restriction.
pub fn room_restriction<'a>(
    occupied: impl IntoIterator<Item = (&'a Bed, &'a Patient)>,
) -> Option<CohortRestriction> {
    let mut sexes = BTreeSet::new();
    let mut isolation_tags = BTreeSet::new();
    let mut occupants = 0usize;

    for (bed, patient) in occupied {
        if !bed.status.holds_occupant() {
            continue;
        }
        occupants += 1;
        if let Some(sex) = cohort_sex(patient.sex) {
            sexes.insert(sex);
        }
        isolation_tags.extend(patient.active_isolation_tags());
    }

    if occupants == 0 || sexes.len() != 1 {
        return None;
    }

    sexes.into_iter().next().map(|sex| CohortRestriction {
        sex,
        isolation_tags,
    })
}

/// Restriction per free (Vacant or Cleaning) bed id, across every room of the snapshot.
pub fn derive_restrictions(
    snapshot: &Snapshot,
    cfg: &CoreConfig,
) -> HashMap<String, CohortRestriction> {
    let index = snapshot.index();
    let rooms = RoomIndex::new(cfg, &snapshot.beds, &snapshot.rooms, &snapshot.sectors);

    let mut restrictions = HashMap::new();
    for (_, beds) in rooms.rooms() {
        let Some(restriction) = room_restriction(occupied_beds(beds, &index)) else {
            continue;
        };
        for bed in beds.iter().filter(|bed| bed.status.is_assignable()) {
            restrictions.insert(bed.id.clone(), restriction.clone());
        }
    }

    tracing::debug!(restricted_beds = restrictions.len(), "derived cohort restrictions");
    restrictions
}

/// Beds of `beds` paired with their occupant, where one exists.
pub(crate) fn occupied_beds<'a>(
    beds: &'a [&'a Bed],
    index: &'a SnapshotIndex<'a>,
) -> impl Iterator<Item = (&'a Bed, &'a Patient)> + 'a {
    beds.iter()
        .copied()
        .filter(|bed| bed.status.holds_occupant())
        .filter_map(|bed| Some((bed, index.occupant(&bed.id)?)))
}
