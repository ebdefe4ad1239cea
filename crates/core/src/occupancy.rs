//! Occupancy indicators per sector.

use crate::model::{BedStatus, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SectorOccupancy {
    pub sector_id: String,
    pub sector_name: String,
    pub total_beds: usize,
    /// Bed count per status wire label.
    pub by_status: BTreeMap<String, usize>,
    pub occupied_beds: usize,
    /// Occupied over total, in `0.0..=1.0`; `0.0` for a sector without beds.
    pub occupancy_rate: f64,
    pub isolated_patients: usize,
    /// Regulations whose destination lies in this sector.
    pub incoming_regulations: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OccupancySummary {
    pub sectors: Vec<SectorOccupancy>,
    pub total_beds: usize,
    pub occupied_beds: usize,
    pub occupancy_rate: f64,
    pub isolated_patients: usize,
    pub active_regulations: usize,
}

/// Per-sector counts in snapshot sector order, plus hospital-wide totals.
///
/// Occupied and Regulated beds both count as occupied.
pub fn summarize(snapshot: &Snapshot) -> OccupancySummary {
    let index = snapshot.index();

    let mut sectors: Vec<SectorOccupancy> = snapshot
        .sectors
        .iter()
        .map(|sector| SectorOccupancy {
            sector_id: sector.id.clone(),
            sector_name: sector.name.clone(),
            ..Default::default()
        })
        .collect();
    let position: BTreeMap<&str, usize> = snapshot
        .sectors
        .iter()
        .enumerate()
        .map(|(i, sector)| (sector.id.as_str(), i))
        .collect();

    for bed in &snapshot.beds {
        let Some(&i) = bed.sector_id.as_deref().and_then(|id| position.get(id)) else {
            continue;
        };
        let entry = &mut sectors[i];
        entry.total_beds += 1;
        *entry
            .by_status
            .entry(bed.status.to_wire().to_string())
            .or_default() += 1;
        if matches!(bed.status, BedStatus::Occupied | BedStatus::Regulated) {
            entry.occupied_beds += 1;
        }
    }

    for patient in &snapshot.patients {
        if patient.has_active_isolation() {
            if let Some(&i) = index
                .patient_sector(patient)
                .and_then(|sector| position.get(sector.id.as_str()))
            {
                sectors[i].isolated_patients += 1;
            }
        }
        if let Some(&i) = patient
            .active_regulation
            .as_ref()
            .and_then(|regulation| regulation.destination_sector_id.as_deref())
            .and_then(|id| position.get(id))
        {
            sectors[i].incoming_regulations += 1;
        }
    }

    for sector in &mut sectors {
        sector.occupancy_rate = rate(sector.occupied_beds, sector.total_beds);
    }

    let total_beds = sectors.iter().map(|s| s.total_beds).sum();
    let occupied_beds = sectors.iter().map(|s| s.occupied_beds).sum();
    OccupancySummary {
        total_beds,
        occupied_beds,
        occupancy_rate: rate(occupied_beds, total_beds),
        isolated_patients: snapshot
            .patients
            .iter()
            .filter(|p| p.has_active_isolation())
            .count(),
        active_regulations: snapshot
            .patients
            .iter()
            .filter(|p| p.active_regulation.is_some())
            .count(),
        sectors,
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
