//! Persistence collaborators.
//!
//! A [`Store`] hands out raw collections for normalization and applies a regulation
//! [`StagedWrites`] batch all-or-nothing. Two implementations are provided:
//!
//! - **[`MemoryStore`]**: collections behind an `RwLock`, for tests and embedding
//! - **[`FileStore`]**: one JSON file per collection in a data directory, plus an
//!   append-only JSON-lines audit trail
//!
//! Both share [`apply_batch`], which validates every target of a batch before mutating
//! anything.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{StoreError, StoreResult};
use crate::model::BedStatus;
use crate::normalize::{render_status_change, RawCollections};
use crate::regulation::{BedUpdate, PatientUpdate, RegulationHistory, WriteBatch};
use chrono::{DateTime, Utc};
use leito_records::{AuditDocument, RegulationHistoryDocument, WireTimestamp};

/// Persistence seam used by the service layer.
pub trait Store: Send + Sync {
    /// Current contents of every collection the engines read.
    fn load(&self) -> StoreResult<RawCollections>;

    /// Apply `batch` atomically: either every write lands or none does.
    fn commit(&self, batch: StagedWrites) -> StoreResult<()>;

    /// Append to the audit trail.
    fn append_audit(&self, entries: &[AuditDocument]) -> StoreResult<()>;

    fn regulation_history(&self) -> StoreResult<Vec<RegulationHistoryDocument>>;
}

/// Writes staged by the regulation protocol, waiting for [`Store::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedWrites {
    pub patients: Vec<PatientUpdate>,
    pub beds: Vec<BedUpdate>,
    pub regulation_history: Vec<RegulationHistory>,
}

impl StagedWrites {
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty() && self.beds.is_empty() && self.regulation_history.is_empty()
    }
}

impl WriteBatch for StagedWrites {
    fn update_patient(&mut self, update: PatientUpdate) {
        self.patients.push(update);
    }

    fn update_bed(&mut self, update: BedUpdate) {
        self.beds.push(update);
    }

    fn upsert_regulation_history(&mut self, record: RegulationHistory) {
        self.regulation_history.push(record);
    }
}

/// Everything a store persists apart from the audit trail.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreData {
    pub collections: RawCollections,
    pub regulation_history: Vec<RegulationHistoryDocument>,
}

/// Which collections a batch modified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub patients: bool,
    pub beds: bool,
    pub regulation_history: bool,
}

/// Validate then apply `batch` to `data`.
///
/// Validation covers every target: unknown patients or beds fail with
/// [`StoreError::NotFound`], beds whose status moved away from the staged expectation fail
/// with [`StoreError::Conflict`]. On error `data` is untouched.
pub fn apply_batch(
    data: &mut StoreData,
    batch: &StagedWrites,
    now: DateTime<Utc>,
) -> StoreResult<AppliedChanges> {
    for update in &batch.patients {
        if !data
            .collections
            .patients
            .iter()
            .any(|doc| doc.id == update.patient_id)
        {
            return Err(StoreError::NotFound {
                kind: "patient",
                id: update.patient_id.clone(),
            });
        }
    }

    for update in &batch.beds {
        let doc = data
            .collections
            .beds
            .iter()
            .find(|doc| doc.id == update.bed_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "bed",
                id: update.bed_id.clone(),
            })?;

        if let Some(expected) = &update.expected_status {
            let found = doc
                .status
                .as_deref()
                .map(BedStatus::from_wire)
                .unwrap_or_else(|| BedStatus::Other(String::new()));
            if &found != expected {
                return Err(StoreError::Conflict {
                    bed_id: update.bed_id.clone(),
                    expected: expected.clone(),
                    found,
                });
            }
        }
    }

    for update in &batch.patients {
        if let Some(doc) = data
            .collections
            .patients
            .iter_mut()
            .find(|doc| doc.id == update.patient_id)
        {
            doc.leito_id = update.bed_id.clone();
            doc.setor_id = update.sector_id.clone();
            if update.clear_active_regulation {
                doc.regulacao_ativa = None;
            }
            if update.clear_icu_request {
                doc.pedido_uti = None;
            }
            if update.clear_relocation_request {
                doc.pedido_remanejamento = None;
            }
        }
    }

    for update in &batch.beds {
        if let Some(doc) = data
            .collections
            .beds
            .iter_mut()
            .find(|doc| doc.id == update.bed_id)
        {
            doc.status = Some(update.status.to_wire().to_string());
            doc.historico.push(render_status_change(&update.history_entry));
        }
    }

    for record in &batch.regulation_history {
        let doc = regulation_history_document(record, now);
        match data
            .regulation_history
            .iter_mut()
            .find(|existing| existing.id == doc.id)
        {
            Some(existing) => *existing = doc,
            None => data.regulation_history.push(doc),
        }
    }

    Ok(AppliedChanges {
        patients: !batch.patients.is_empty(),
        beds: !batch.beds.is_empty(),
        regulation_history: !batch.regulation_history.is_empty(),
    })
}

/// Render a history record, stamping `now` when no conclusion time was staged.
pub fn regulation_history_document(
    record: &RegulationHistory,
    now: DateTime<Utc>,
) -> RegulationHistoryDocument {
    RegulationHistoryDocument {
        id: record.patient_id.clone(),
        status: record.status.clone(),
        paciente_nome: Some(record.patient_name.clone()),
        iniciado_em: record.started_at.map(WireTimestamp::from_datetime),
        data_conclusao: Some(WireTimestamp::from_datetime(
            record.concluded_at.unwrap_or(now),
        )),
        user_name_conclusao: Some(record.concluded_by.clone()),
        tempo_regulacao_minutos: record.duration_minutes,
        leito_origem_id: record.origin_bed_id.clone(),
        setor_origem_id: record.origin_sector_id.clone(),
        leito_destino_final_id: record.destination_bed_id.clone(),
        setor_destino_final_id: record.destination_sector_id.clone(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::StoreData;
    use crate::normalize::RawCollections;
    use leito_records::{BedDocument, Collection, PatientDocument, SectorDocument};

    /// Patient `p1` regulated from bed A (PS) to bed B (ward), started at
    /// 2024-05-01T08:00:00Z.
    pub fn regulated_data() -> StoreData {
        let patients: Vec<PatientDocument> = Collection::parse_json(
            r#"{
                "p1": {
                    "nomeCompleto": "Maria Souza",
                    "sexo": "F",
                    "leitoId": "A",
                    "regulacaoAtiva": {
                        "leitoOrigemId": "A",
                        "setorOrigemId": "PS",
                        "leitoDestinoId": {"id": "B"},
                        "setorDestinoId": "ENF",
                        "iniciadoEm": "2024-05-01T08:00:00Z"
                    }
                }
            }"#,
        )
        .expect("patients");
        let beds: Vec<BedDocument> = Collection::parse_json(
            r#"[
                {"id": "A", "codigoLeito": "PS-01", "status": "Ocupado", "setorId": "PS"},
                {"id": "B", "codigoLeito": "201A", "status": "Vago", "setorId": "ENF"},
                {"id": "C", "codigoLeito": "201B", "status": "Reservado", "setorId": "ENF"}
            ]"#,
        )
        .expect("beds");
        let sectors: Vec<SectorDocument> = Collection::parse_json(
            r#"[
                {"id": "PS", "nomeSetor": "Pronto Socorro", "tipoSetor": "PS"},
                {"id": "ENF", "nomeSetor": "Enfermaria 2", "tipoSetor": "ENFERMARIA"}
            ]"#,
        )
        .expect("sectors");

        StoreData {
            collections: RawCollections {
                patients,
                beds,
                sectors,
                ..Default::default()
            },
            regulation_history: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::regulated_data;
    use super::*;
    use crate::model::StatusChange;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 42, 0)
            .single()
            .expect("valid datetime")
    }

    fn bed_update(bed_id: &str, status: BedStatus, expected: Option<BedStatus>) -> BedUpdate {
        BedUpdate {
            bed_id: bed_id.into(),
            history_entry: StatusChange {
                status: status.clone(),
                at: Some(now()),
                patient_id: None,
            },
            status,
            expected_status: expected,
        }
    }

    fn history(patient_id: &str, minutes: Option<i64>) -> RegulationHistory {
        RegulationHistory {
            patient_id: patient_id.into(),
            status: "Concluída".into(),
            patient_name: "Maria Souza".into(),
            started_at: None,
            concluded_at: None,
            concluded_by: "Enf. Ana".into(),
            duration_minutes: minutes,
            origin_bed_id: Some("A".into()),
            origin_sector_id: None,
            destination_bed_id: Some("B".into()),
            destination_sector_id: None,
        }
    }

    #[test]
    fn applies_every_write() {
        let mut data = regulated_data();
        let mut batch = StagedWrites::default();
        batch.update_patient(PatientUpdate {
            patient_id: "p1".into(),
            bed_id: Some("B".into()),
            sector_id: Some("ENF".into()),
            clear_active_regulation: true,
            clear_icu_request: false,
            clear_relocation_request: false,
        });
        batch.update_bed(bed_update("A", BedStatus::Cleaning, Some(BedStatus::Occupied)));
        batch.update_bed(bed_update("B", BedStatus::Occupied, Some(BedStatus::Vacant)));
        batch.upsert_regulation_history(history("p1", Some(42)));

        let changes = apply_batch(&mut data, &batch, now()).expect("apply");
        assert!(changes.patients && changes.beds && changes.regulation_history);

        let patient = &data.collections.patients[0];
        assert_eq!(patient.leito_id.as_deref(), Some("B"));
        assert!(patient.regulacao_ativa.is_none());

        let origin = &data.collections.beds[0];
        assert_eq!(origin.status.as_deref(), Some("Higienização"));
        assert_eq!(origin.historico.len(), 1);

        let record = &data.regulation_history[0];
        assert_eq!(record.id, "p1");
        assert_eq!(record.tempo_regulacao_minutos, Some(42));
        assert_eq!(
            record.data_conclusao.as_ref().and_then(WireTimestamp::to_datetime),
            Some(now())
        );
    }

    #[test]
    fn history_upsert_replaces_existing_record() {
        let mut data = regulated_data();
        let mut batch = StagedWrites::default();
        batch.upsert_regulation_history(history("p1", Some(10)));
        apply_batch(&mut data, &batch, now()).expect("first");

        let mut batch = StagedWrites::default();
        batch.upsert_regulation_history(history("p1", None));
        apply_batch(&mut data, &batch, now()).expect("second");

        assert_eq!(data.regulation_history.len(), 1);
        assert_eq!(data.regulation_history[0].tempo_regulacao_minutos, None);
    }

    #[test]
    fn unknown_bed_leaves_data_untouched() {
        let mut data = regulated_data();
        let before = data.clone();
        let mut batch = StagedWrites::default();
        batch.update_bed(bed_update("A", BedStatus::Cleaning, None));
        batch.update_bed(bed_update("Z", BedStatus::Vacant, None));

        let err = apply_batch(&mut data, &batch, now()).expect_err("unknown bed");
        assert!(matches!(err, StoreError::NotFound { kind: "bed", .. }));
        assert_eq!(data, before);
    }

    #[test]
    fn changed_bed_status_is_a_conflict() {
        let mut data = regulated_data();
        let before = data.clone();
        let mut batch = StagedWrites::default();
        batch.update_bed(bed_update("B", BedStatus::Occupied, Some(BedStatus::Vacant)));
        batch.update_bed(bed_update("C", BedStatus::Occupied, Some(BedStatus::Vacant)));

        let err = apply_batch(&mut data, &batch, now()).expect_err("conflict");
        match err {
            StoreError::Conflict {
                bed_id,
                expected,
                found,
            } => {
                assert_eq!(bed_id, "C");
                assert_eq!(expected, BedStatus::Vacant);
                assert_eq!(found, BedStatus::ExternalReservation);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(data, before);
    }
}
