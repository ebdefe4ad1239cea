//! Bed-management service.
//!
//! Ties the pure engines to a [`Store`]: every read takes a fresh snapshot and recomputes
//! derived state, and regulation conclusions are staged, committed as one batch and then
//! audited on a best-effort basis.

use crate::audit::AuditEntry;
use crate::cohort::derive_restrictions;
use crate::compatibility::{CompatibilityResolver, Rejection};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{Bed, CareLevel, CohortRestriction, Patient, Snapshot};
use crate::normalize::normalize_collections;
use crate::occupancy::{summarize, OccupancySummary};
use crate::regulation::{conclude_regulation, ConcludeRequest, RegulationOutcome};
use crate::risk::{detect_risks, RiskReport};
use crate::store::{StagedWrites, Store};
use chrono::{DateTime, NaiveDate, Utc};
use leito_records::{RegulationHistoryDocument, WireTimestamp};
use leito_types::NonEmptyText;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

/// One bed considered for a target patient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BedAssessment {
    pub bed: Bed,
    pub restriction: Option<CohortRestriction>,
    /// `None` when the bed is compatible.
    pub rejection: Option<Rejection>,
}

#[derive(Clone)]
pub struct BedService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn Store>,
}

impl BedService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn Store>) -> Self {
        Self { cfg, store }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Load and normalize the current state of every collection.
    pub fn snapshot(&self) -> CoreResult<Snapshot> {
        let raw = self.store.load()?;
        Ok(normalize_collections(&self.cfg, &raw))
    }

    pub fn restrictions(&self) -> CoreResult<HashMap<String, CohortRestriction>> {
        let snapshot = self.snapshot()?;
        Ok(derive_restrictions(&snapshot, &self.cfg))
    }

    /// Compatible beds for `patient_id`, in store order.
    pub fn compatible_beds(
        &self,
        patient_id: &str,
        care_level: CareLevel,
        today: NaiveDate,
    ) -> CoreResult<Vec<BedAssessment>> {
        Ok(self
            .assess_beds(patient_id, care_level, today)?
            .into_iter()
            .filter(|assessment| assessment.rejection.is_none())
            .collect())
    }

    /// Every bed with the first rule it fails for `patient_id`, in store order.
    pub fn assess_beds(
        &self,
        patient_id: &str,
        care_level: CareLevel,
        today: NaiveDate,
    ) -> CoreResult<Vec<BedAssessment>> {
        let snapshot = self.snapshot()?;
        let target = find_patient(&snapshot, patient_id)?;
        let restrictions = derive_restrictions(&snapshot, &self.cfg);
        let resolver = CompatibilityResolver::new(&self.cfg, &snapshot, target, care_level, today);

        Ok(snapshot
            .beds
            .iter()
            .map(|bed| BedAssessment {
                rejection: resolver.explain(bed),
                restriction: restrictions.get(&bed.id).cloned(),
                bed: bed.clone(),
            })
            .collect())
    }

    pub fn risks(&self) -> CoreResult<(Snapshot, HashMap<String, RiskReport>)> {
        let snapshot = self.snapshot()?;
        let risks = detect_risks(
            &snapshot.patients,
            &snapshot.beds,
            &snapshot.rooms,
            &snapshot.sectors,
            &self.cfg,
        );
        Ok((snapshot, risks))
    }

    pub fn occupancy(&self) -> CoreResult<OccupancySummary> {
        let snapshot = self.snapshot()?;
        Ok(summarize(&snapshot))
    }

    /// Concluded regulations, most recently concluded first.
    pub fn regulation_history(&self) -> CoreResult<Vec<RegulationHistoryDocument>> {
        let mut history = self.store.regulation_history()?;
        history.sort_by_key(|record| {
            Reverse(
                record
                    .data_conclusao
                    .as_ref()
                    .and_then(WireTimestamp::to_datetime),
            )
        });
        Ok(history)
    }

    /// Conclude `patient_id`'s active regulation and persist the result.
    ///
    /// The batch is committed atomically; the audit trail is appended afterwards and a
    /// failure there is logged without failing the conclusion.
    pub fn conclude_regulation(
        &self,
        patient_id: &str,
        extra_beds_to_release: Vec<String>,
        concluded_by: &str,
        reference_time: DateTime<Utc>,
    ) -> CoreResult<RegulationOutcome> {
        let concluded_by = NonEmptyText::new(concluded_by).map_err(|_| {
            CoreError::InvalidInput("concluding user name must not be empty".into())
        })?;

        let snapshot = self.snapshot()?;
        let patient = find_patient(&snapshot, patient_id)?;
        let regulation = patient.active_regulation.as_ref();

        let origin_bed = regulation
            .and_then(|r| r.origin_bed_id.as_deref())
            .or(patient.bed_id.as_deref())
            .and_then(|id| snapshot.bed(id));
        let destination_bed = regulation
            .and_then(|r| r.destination_bed_id.as_deref())
            .and_then(|id| snapshot.bed(id));
        let origin_sector = regulation
            .and_then(|r| r.origin_sector_id.as_deref())
            .or_else(|| origin_bed.and_then(|bed| bed.sector_id.as_deref()))
            .and_then(|id| snapshot.sector(id));
        let destination_sector = regulation
            .and_then(|r| r.destination_sector_id.as_deref())
            .or_else(|| destination_bed.and_then(|bed| bed.sector_id.as_deref()))
            .and_then(|id| snapshot.sector(id));

        let request = ConcludeRequest {
            patient,
            origin_bed,
            origin_sector,
            destination_bed,
            destination_sector,
            extra_beds_to_release,
            concluded_by: concluded_by.as_str().to_string(),
        };

        let mut batch = StagedWrites::default();
        let outcome = conclude_regulation(Some(&mut batch), &request, reference_time)?;
        self.store.commit(batch)?;

        tracing::info!(
            patient_id,
            destination_bed_id = outcome.destination_bed_id.as_deref().unwrap_or_default(),
            duration_minutes = ?outcome.duration_minutes,
            beds = outcome.touched_bed_ids.len(),
            "regulation concluded"
        );

        let entries: Vec<_> = AuditEntry::regulation_lines(
            &outcome.audit_lines,
            reference_time,
            concluded_by.as_str(),
        )
        .iter()
        .map(AuditEntry::to_document)
        .collect();
        if let Err(err) = self.store.append_audit(&entries) {
            tracing::warn!(patient_id, error = %err, "failed to append regulation audit");
        }

        Ok(outcome)
    }
}

fn find_patient<'a>(snapshot: &'a Snapshot, patient_id: &str) -> CoreResult<&'a Patient> {
    snapshot
        .patient(patient_id)
        .ok_or_else(|| CoreError::UnknownPatient(patient_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::normalize::RawCollections;
    use crate::store::fixtures::regulated_data;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use leito_records::{AuditDocument, Collection};

    /// Delegates to a memory store but refuses audit writes.
    struct AuditlessStore(MemoryStore);

    impl Store for AuditlessStore {
        fn load(&self) -> StoreResult<RawCollections> {
            self.0.load()
        }

        fn commit(&self, batch: StagedWrites) -> StoreResult<()> {
            self.0.commit(batch)
        }

        fn append_audit(&self, _entries: &[AuditDocument]) -> StoreResult<()> {
            Err(StoreError::FileWrite(std::io::Error::other("disk full")))
        }

        fn regulation_history(&self) -> StoreResult<Vec<RegulationHistoryDocument>> {
            self.0.regulation_history()
        }
    }

    fn concluded_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 42, 0)
            .single()
            .expect("valid datetime")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")
    }

    #[test]
    fn conclusion_is_committed_and_audited() {
        let store = Arc::new(MemoryStore::from_data(regulated_data()));
        let service = BedService::new(Arc::new(CoreConfig::default()), store.clone());

        let outcome = service
            .conclude_regulation("p1", vec![], "Enf. Ana", concluded_at())
            .expect("conclude");
        assert_eq!(outcome.duration_minutes, Some(42));
        assert_eq!(outcome.touched_bed_ids, vec!["A", "B"]);

        let snapshot = service.snapshot().expect("snapshot");
        let patient = snapshot.patient("p1").expect("patient");
        assert!(patient.active_regulation.is_none());
        assert_eq!(patient.bed_id.as_deref(), Some("B"));
        assert_eq!(
            snapshot.bed("A").map(|bed| &bed.status),
            Some(&crate::model::BedStatus::Cleaning)
        );

        let trail = store.audit_trail().expect("trail");
        assert_eq!(trail.len(), 1);
        assert!(trail[0].acao.contains("Pronto Socorro - PS-01"));
        assert!(trail[0].acao.contains("Enfermaria 2 - 201A"));
        assert_eq!(trail[0].user_name, "Enf. Ana");

        let err = service
            .conclude_regulation("p1", vec![], "Enf. Ana", concluded_at())
            .expect_err("already concluded");
        assert!(matches!(err, CoreError::Regulation(_)));
    }

    #[test]
    fn audit_failure_does_not_fail_conclusion() {
        let store = Arc::new(AuditlessStore(MemoryStore::from_data(regulated_data())));
        let service = BedService::new(Arc::new(CoreConfig::default()), store.clone());

        service
            .conclude_regulation("p1", vec![], "Enf. Ana", concluded_at())
            .expect("conclude");
        assert_eq!(store.regulation_history().expect("history").len(), 1);
    }

    #[test]
    fn unknown_patient_and_blank_user_are_rejected() {
        let service = BedService::new(
            Arc::new(CoreConfig::default()),
            Arc::new(MemoryStore::from_data(regulated_data())),
        );

        assert!(matches!(
            service.conclude_regulation("nobody", vec![], "Enf. Ana", concluded_at()),
            Err(CoreError::UnknownPatient(_))
        ));
        assert!(matches!(
            service.conclude_regulation("p1", vec![], "  ", concluded_at()),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn assessments_cover_every_bed() {
        let service = BedService::new(
            Arc::new(CoreConfig::default()),
            Arc::new(MemoryStore::from_data(regulated_data())),
        );

        let assessments = service
            .assess_beds("p1", CareLevel::Ward, today())
            .expect("assess");
        assert_eq!(assessments.len(), 3);
        assert!(matches!(
            assessments[0].rejection,
            Some(Rejection::NotAssignable { .. })
        ));

        let compatible = service
            .compatible_beds("p1", CareLevel::Ward, today())
            .expect("compatible");
        let ids: Vec<&str> = compatible.iter().map(|a| a.bed.id.as_str()).collect();
        assert_eq!(ids, vec!["B"]);
    }

    #[test]
    fn odd_wire_values_do_not_block_a_conclusion() {
        let mut data = regulated_data();
        data.collections.patients = Collection::parse_json(
            r#"{
                "p1": {
                    "nomeCompleto": "Maria Souza",
                    "sexo": "F",
                    "leitoId": "A",
                    "regulacaoAtiva": {
                        "leitoOrigemId": "A",
                        "setorOrigemId": "PS",
                        "leitoDestinoId": "B",
                        "setorDestinoId": "ENF",
                        "iniciadoEm": {"toDate": null}
                    }
                },
                "p2": {
                    "nomeCompleto": "Jose Lima",
                    "dataNascimento": true,
                    "isolamentos": [false, "", 0]
                }
            }"#,
        )
        .expect("patients");
        let service = BedService::new(
            Arc::new(CoreConfig::default()),
            Arc::new(MemoryStore::from_data(data)),
        );

        let snapshot = service.snapshot().expect("snapshot");
        assert_eq!(snapshot.patients.len(), 2);

        let outcome = service
            .conclude_regulation("p1", vec![], "Enf. Ana", concluded_at())
            .expect("conclude");
        assert_eq!(outcome.duration_minutes, None);
        assert_eq!(outcome.touched_bed_ids, vec!["A", "B"]);
    }

    #[test]
    fn history_lists_latest_conclusion_first() {
        let mut data = regulated_data();
        data.regulation_history = Collection::parse_json(
            r#"[
                {"id": "h1", "status": "CONCLUIDA", "dataConclusao": "2024-04-01T10:00:00Z"},
                {"id": "h2", "status": "CONCLUIDA"},
                {"id": "h3", "status": "CONCLUIDA", "dataConclusao": "2024-04-20T10:00:00Z"}
            ]"#,
        )
        .expect("history");
        let service = BedService::new(
            Arc::new(CoreConfig::default()),
            Arc::new(MemoryStore::from_data(data)),
        );

        let ids: Vec<String> = service
            .regulation_history()
            .expect("history")
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec!["h3", "h1", "h2"]);
    }
}
