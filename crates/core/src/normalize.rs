//! Normalization layer: raw store documents to canonical records.
//!
//! Responsibilities:
//! - closed vocabularies for sex, bed status and sector type
//! - isolation status canonicalization (`active` iff Confirmed or Suspected)
//! - infection enrichment through an [`InfectionCatalog`], degrading gracefully on failure
//! - rendering canonical records back to documents (used by the stores on write)
//!
//! Reference flattening already happened in `leito_records`; nothing here sees reference
//! objects. Normalizing, rendering and normalizing again yields the same record.

use crate::config::CoreConfig;
use crate::constants::ACTIVE_ISOLATION_STATUSES;
use crate::error::CatalogError;
use crate::model::{
    ActiveRegulation, Bed, BedStatus, BinarySex, IcuRequest, Infection, Isolation, Patient,
    RelocationRequest, Room, Sector, SectorType, Sex, Snapshot, StatusChange,
};
use leito_records::{
    BedDocument, IcuRequestDocument, InfectionDocument, IsolationDocument, PatientDocument,
    RegulationDocument, RelocationRequestDocument, RoomDocument, SectorDocument,
    StatusChangeDocument, WireTimestamp,
};
use leito_types::fold;
use std::collections::HashMap;

// ============================================================================
// Sex
// ============================================================================

/// Recorded sex, or `None` when the value is missing or outside the vocabulary.
pub fn normalize_sex(raw: Option<&str>) -> Option<Sex> {
    raw.and_then(Sex::from_wire)
}

/// Binary sex used by the bed-compatibility rules.
///
/// Anything other than a recorded Male (missing, unrecognized, Intersex, Other) is treated as
/// Female. This default is kept for compatibility with existing allocations and lives only
/// here so it can be revisited in one place.
pub fn compatibility_sex(sex: Option<Sex>) -> BinarySex {
    match sex {
        Some(Sex::Male) => BinarySex::Male,
        _ => BinarySex::Female,
    }
}

/// Binary sex used by cohort derivation; `None` when it cannot be determined.
pub fn cohort_sex(sex: Option<Sex>) -> Option<BinarySex> {
    match sex {
        Some(Sex::Male) => Some(BinarySex::Male),
        Some(Sex::Female) => Some(BinarySex::Female),
        _ => None,
    }
}

/// True iff the isolation status counts as active.
pub fn is_active_isolation_status(status: Option<&str>) -> bool {
    status
        .map(fold)
        .is_some_and(|folded| ACTIVE_ISOLATION_STATUSES.contains(&folded.as_str()))
}

// ============================================================================
// Infection catalogue
// ============================================================================

/// Lookup of infection metadata by id.
pub trait InfectionCatalog {
    fn lookup(&self, infection_id: &str) -> Result<Option<Infection>, CatalogError>;
}

/// In-memory catalogue built from the `infeccoes` collection.
#[derive(Clone, Debug, Default)]
pub struct InfectionTable {
    by_id: HashMap<String, Infection>,
}

impl InfectionTable {
    pub fn new(infections: impl IntoIterator<Item = Infection>) -> Self {
        Self {
            by_id: infections
                .into_iter()
                .map(|infection| (infection.id.clone(), infection))
                .collect(),
        }
    }
}

impl InfectionCatalog for InfectionTable {
    fn lookup(&self, infection_id: &str) -> Result<Option<Infection>, CatalogError> {
        Ok(self.by_id.get(infection_id).cloned())
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Raw collections as read from the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawCollections {
    pub patients: Vec<PatientDocument>,
    pub beds: Vec<BedDocument>,
    pub sectors: Vec<SectorDocument>,
    pub rooms: Vec<RoomDocument>,
    pub infections: Vec<InfectionDocument>,
}

/// Turns documents into canonical records.
pub struct Normalizer<'a> {
    cfg: &'a CoreConfig,
    catalog: &'a dyn InfectionCatalog,
}

impl<'a> Normalizer<'a> {
    pub fn new(cfg: &'a CoreConfig, catalog: &'a dyn InfectionCatalog) -> Self {
        Self { cfg, catalog }
    }

    pub fn patient(&self, doc: &PatientDocument) -> Patient {
        Patient {
            id: doc.id.trim().to_string(),
            name: non_blank(doc.nome_completo.as_deref()),
            sex: normalize_sex(doc.sexo.as_deref()),
            birth_date: doc.data_nascimento.as_ref().and_then(WireTimestamp::to_date),
            bed_id: non_blank(doc.leito_id.as_deref()),
            sector_id: non_blank(doc.setor_id.as_deref()),
            isolations: doc
                .isolamentos
                .iter()
                .flatten()
                .map(|entry| self.isolation(entry))
                .collect(),
            active_regulation: doc.regulacao_ativa.as_ref().map(regulation),
            icu_request: doc.pedido_uti.as_ref().map(|request| IcuRequest {
                requested_at: instant(request.solicitado_em.as_ref()),
            }),
            relocation_request: doc
                .pedido_remanejamento
                .as_ref()
                .map(|request| RelocationRequest {
                    reason: non_blank(request.motivo.as_deref()),
                    requested_at: instant(request.solicitado_em.as_ref()),
                }),
            origin_sector: non_blank(doc.setor_origem.as_deref()),
        }
    }

    /// Normalize one isolation entry, merging catalogue metadata when the lookup succeeds.
    ///
    /// Lookup failures keep the entry with whatever the document carried.
    pub fn isolation(&self, doc: &IsolationDocument) -> Isolation {
        let infection_id = non_blank(doc.infeccao_id.as_deref())
            .or_else(|| non_blank(doc.infeccao.as_deref()));

        let mut isolation = Isolation {
            infection_id,
            status: non_blank(doc.status.as_deref()),
            active: is_active_isolation_status(doc.status.as_deref()),
            acronym: non_blank(doc.sigla.as_deref()),
            name: non_blank(doc.nome.as_deref()),
            started_at: instant(doc.data_inicio.as_ref()),
        };

        let Some(infection_id) = isolation.infection_id.as_deref() else {
            return isolation;
        };

        match self.catalog.lookup(infection_id) {
            Ok(Some(infection)) => {
                if infection.acronym.is_some() {
                    isolation.acronym = infection.acronym;
                }
                if infection.name.is_some() {
                    isolation.name = infection.name;
                }
            }
            Ok(None) => {
                tracing::debug!(infection_id, "infection not found in catalogue");
            }
            Err(err) => {
                tracing::warn!(infection_id, error = %err, "infection lookup failed");
            }
        }

        isolation
    }

    pub fn bed(&self, doc: &BedDocument) -> Bed {
        Bed {
            id: doc.id.trim().to_string(),
            code: doc.codigo_leito.trim().to_string(),
            status: doc
                .status
                .as_deref()
                .map(BedStatus::from_wire)
                .unwrap_or_else(|| BedStatus::Other(String::new())),
            sector_id: non_blank(doc.setor_id.as_deref()),
            room_id: non_blank(doc.quarto_id.as_deref()),
            protected_pathway: doc.leito_pcp.unwrap_or(false),
            history: doc.historico.iter().map(status_change).collect(),
        }
    }

    pub fn sector(&self, doc: &SectorDocument) -> Sector {
        Sector {
            id: doc.id.trim().to_string(),
            name: doc.nome_setor.trim().to_string(),
            acronym: non_blank(doc.sigla_setor.as_deref()),
            kind: SectorType::from_wire(
                doc.tipo_setor.as_deref().unwrap_or_default(),
                self.cfg.open_sector_labels(),
            ),
        }
    }

    pub fn room(&self, doc: &RoomDocument) -> Room {
        Room {
            id: doc.id.trim().to_string(),
            name: non_blank(doc.nome_quarto.as_deref()),
            sector_id: non_blank(doc.setor_id.as_deref()),
            bed_ids: doc.leitos_ids.clone(),
        }
    }

    /// Normalize every collection and derive patients' sectors from their beds when the
    /// patient document carries none.
    pub fn snapshot(&self, raw: &RawCollections) -> Snapshot {
        let beds: Vec<Bed> = raw.beds.iter().map(|doc| self.bed(doc)).collect();
        let bed_sectors: HashMap<&str, &str> = beds
            .iter()
            .filter_map(|bed| Some((bed.id.as_str(), bed.sector_id.as_deref()?)))
            .collect();

        let patients = raw
            .patients
            .iter()
            .map(|doc| {
                let mut patient = self.patient(doc);
                if patient.sector_id.is_none() {
                    patient.sector_id = patient
                        .bed_id
                        .as_deref()
                        .and_then(|bed_id| bed_sectors.get(bed_id))
                        .map(|sector_id| sector_id.to_string());
                }
                patient
            })
            .collect();

        let snapshot = Snapshot {
            patients,
            sectors: raw.sectors.iter().map(|doc| self.sector(doc)).collect(),
            rooms: raw.rooms.iter().map(|doc| self.room(doc)).collect(),
            infections: raw.infections.iter().map(infection).collect(),
            beds,
        };

        tracing::debug!(
            patients = snapshot.patients.len(),
            beds = snapshot.beds.len(),
            sectors = snapshot.sectors.len(),
            rooms = snapshot.rooms.len(),
            "normalized snapshot"
        );

        snapshot
    }
}

/// Normalize the collections, using the `infeccoes` collection itself as the catalogue.
pub fn normalize_collections(cfg: &CoreConfig, raw: &RawCollections) -> Snapshot {
    let catalog = InfectionTable::new(raw.infections.iter().map(infection));
    Normalizer::new(cfg, &catalog).snapshot(raw)
}

pub fn infection(doc: &InfectionDocument) -> Infection {
    Infection {
        id: doc.id.trim().to_string(),
        acronym: non_blank(doc.sigla_infeccao.as_deref()),
        name: non_blank(doc.nome_infeccao.as_deref()),
    }
}

fn regulation(doc: &RegulationDocument) -> ActiveRegulation {
    ActiveRegulation {
        origin_bed_id: non_blank(doc.leito_origem_id.as_deref()),
        origin_sector_id: non_blank(doc.setor_origem_id.as_deref()),
        destination_bed_id: non_blank(doc.leito_destino_id.as_deref()),
        destination_sector_id: non_blank(doc.setor_destino_id.as_deref()),
        started_at: instant(doc.iniciado_em.as_ref()),
        patient_name: non_blank(doc.paciente_nome.as_deref()),
    }
}

fn status_change(doc: &StatusChangeDocument) -> StatusChange {
    StatusChange {
        status: BedStatus::from_wire(&doc.status),
        at: instant(doc.timestamp.as_ref()),
        patient_id: non_blank(doc.paciente_id.as_deref()),
    }
}

fn instant(value: Option<&WireTimestamp>) -> Option<chrono::DateTime<chrono::Utc>> {
    value.and_then(WireTimestamp::to_datetime)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Rendering (canonical -> document)
// ============================================================================

pub fn render_patient(patient: &Patient) -> PatientDocument {
    PatientDocument {
        id: patient.id.clone(),
        nome_completo: patient.name.clone(),
        sexo: patient.sex.map(|sex| sex.to_wire().to_string()),
        data_nascimento: patient.birth_date.map(WireTimestamp::from_date),
        leito_id: patient.bed_id.clone(),
        setor_id: patient.sector_id.clone(),
        isolamentos: patient
            .isolations
            .iter()
            .map(|isolation| Some(render_isolation(isolation)))
            .collect(),
        regulacao_ativa: patient.active_regulation.as_ref().map(render_regulation),
        pedido_uti: patient.icu_request.as_ref().map(|request| IcuRequestDocument {
            solicitado_em: request.requested_at.map(WireTimestamp::from_datetime),
        }),
        pedido_remanejamento: patient
            .relocation_request
            .as_ref()
            .map(|request| RelocationRequestDocument {
                motivo: request.reason.clone(),
                solicitado_em: request.requested_at.map(WireTimestamp::from_datetime),
            }),
        setor_origem: patient.origin_sector.clone(),
    }
}

fn render_isolation(isolation: &Isolation) -> IsolationDocument {
    IsolationDocument {
        infeccao_id: isolation.infection_id.clone(),
        infeccao: None,
        status: isolation.status.clone(),
        sigla: isolation.acronym.clone(),
        nome: isolation.name.clone(),
        data_inicio: isolation.started_at.map(WireTimestamp::from_datetime),
    }
}

fn render_regulation(regulation: &ActiveRegulation) -> RegulationDocument {
    RegulationDocument {
        leito_origem_id: regulation.origin_bed_id.clone(),
        setor_origem_id: regulation.origin_sector_id.clone(),
        leito_destino_id: regulation.destination_bed_id.clone(),
        setor_destino_id: regulation.destination_sector_id.clone(),
        iniciado_em: regulation.started_at.map(WireTimestamp::from_datetime),
        paciente_nome: regulation.patient_name.clone(),
    }
}

pub fn render_status_change(change: &StatusChange) -> StatusChangeDocument {
    StatusChangeDocument {
        status: change.status.to_wire().to_string(),
        timestamp: change.at.map(WireTimestamp::from_datetime),
        paciente_id: change.patient_id.clone(),
    }
}

pub fn render_bed(bed: &Bed) -> BedDocument {
    BedDocument {
        id: bed.id.clone(),
        codigo_leito: bed.code.clone(),
        status: match &bed.status {
            BedStatus::Other(raw) if raw.is_empty() => None,
            status => Some(status.to_wire().to_string()),
        },
        setor_id: bed.sector_id.clone(),
        quarto_id: bed.room_id.clone(),
        leito_pcp: bed.protected_pathway.then_some(true),
        historico: bed.history.iter().map(render_status_change).collect(),
    }
}
