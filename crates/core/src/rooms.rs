//! Grouping of beds into rooms.
//!
//! Ward beds share a room when they sit in the same sector and their codes share the
//! configured prefix. Beds in any other sector belong to the explicit room that either
//! lists them or is named by the bed's `quartoId`. A bed without a room has no companions.

use crate::config::CoreConfig;
use crate::model::{Bed, Room, Sector, SectorType};
use std::collections::{BTreeMap, HashMap};

/// Identity of a room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoomKey {
    /// Implicit ward room.
    Prefix { sector_id: String, prefix: String },
    /// Room record id.
    Explicit(String),
}

/// Bed-to-room assignment for one snapshot.
#[derive(Debug)]
pub struct RoomIndex<'a> {
    by_bed: HashMap<&'a str, RoomKey>,
    members: BTreeMap<RoomKey, Vec<&'a Bed>>,
    names: HashMap<&'a str, &'a str>,
}

impl<'a> RoomIndex<'a> {
    pub fn new(cfg: &CoreConfig, beds: &'a [Bed], rooms: &'a [Room], sectors: &[Sector]) -> Self {
        let ward_sectors: Vec<&str> = sectors
            .iter()
            .filter(|sector| sector.kind == SectorType::Ward)
            .map(|sector| sector.id.as_str())
            .collect();

        let mut listed: HashMap<&str, &str> = HashMap::new();
        for room in rooms {
            for bed_id in &room.bed_ids {
                listed.entry(bed_id.as_str()).or_insert(room.id.as_str());
            }
        }

        let mut by_bed = HashMap::new();
        let mut members: BTreeMap<RoomKey, Vec<&'a Bed>> = BTreeMap::new();
        for bed in beds {
            let key = match bed.sector_id.as_deref() {
                Some(sector_id) if ward_sectors.contains(&sector_id) => {
                    let prefix = bed.code_prefix(cfg.room_prefix_len());
                    (!prefix.is_empty()).then(|| RoomKey::Prefix {
                        sector_id: sector_id.to_string(),
                        prefix: prefix.to_string(),
                    })
                }
                _ => bed
                    .room_id
                    .as_deref()
                    .or_else(|| listed.get(bed.id.as_str()).copied())
                    .map(|room_id| RoomKey::Explicit(room_id.to_string())),
            };

            if let Some(key) = key {
                members.entry(key.clone()).or_default().push(bed);
                by_bed.insert(bed.id.as_str(), key);
            }
        }

        let names = rooms
            .iter()
            .filter_map(|room| Some((room.id.as_str(), room.name.as_deref()?)))
            .collect();

        Self {
            by_bed,
            members,
            names,
        }
    }

    pub fn room_of(&self, bed_id: &str) -> Option<&RoomKey> {
        self.by_bed.get(bed_id)
    }

    /// Every bed of the room, the queried one included, in snapshot order.
    pub fn members(&self, key: &RoomKey) -> &[&'a Bed] {
        self.members.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Beds sharing a room with `bed_id`, excluding it.
    pub fn companions_of(&self, bed_id: &str) -> Vec<&'a Bed> {
        self.room_of(bed_id)
            .map(|key| {
                self.members(key)
                    .iter()
                    .copied()
                    .filter(|bed| bed.id != bed_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn rooms(&self) -> impl Iterator<Item = (&RoomKey, &[&'a Bed])> {
        self.members
            .iter()
            .map(|(key, beds)| (key, beds.as_slice()))
    }

    /// Human-readable room label for reports.
    pub fn label(&self, key: &RoomKey) -> String {
        match key {
            RoomKey::Prefix { prefix, .. } => format!("Quarto {prefix}"),
            RoomKey::Explicit(id) => self
                .names
                .get(id.as_str())
                .map(|name| name.to_string())
                .unwrap_or_else(|| format!("Quarto {id}")),
        }
    }
}
