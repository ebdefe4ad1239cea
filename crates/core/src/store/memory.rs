//! In-memory store.

use super::{apply_batch, StagedWrites, Store, StoreData};
use crate::error::{StoreError, StoreResult};
use crate::normalize::RawCollections;
use chrono::Utc;
use leito_records::{AuditDocument, RegulationHistoryDocument};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
    audit: RwLock<Vec<AuditDocument>>,
}

impl MemoryStore {
    pub fn new(collections: RawCollections) -> Self {
        Self::from_data(StoreData {
            collections,
            regulation_history: Vec::new(),
        })
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            data: RwLock::new(data),
            audit: RwLock::new(Vec::new()),
        }
    }

    pub fn audit_trail(&self) -> StoreResult<Vec<AuditDocument>> {
        Ok(self.audit.read().map_err(|_| StoreError::Poisoned)?.clone())
    }
}

impl Store for MemoryStore {
    fn load(&self) -> StoreResult<RawCollections> {
        let data = self.data.read().map_err(|_| StoreError::Poisoned)?;
        Ok(data.collections.clone())
    }

    fn commit(&self, batch: StagedWrites) -> StoreResult<()> {
        let mut data = self.data.write().map_err(|_| StoreError::Poisoned)?;
        apply_batch(&mut data, &batch, Utc::now())?;
        Ok(())
    }

    fn append_audit(&self, entries: &[AuditDocument]) -> StoreResult<()> {
        let mut audit = self.audit.write().map_err(|_| StoreError::Poisoned)?;
        audit.extend_from_slice(entries);
        Ok(())
    }

    fn regulation_history(&self) -> StoreResult<Vec<RegulationHistoryDocument>> {
        let data = self.data.read().map_err(|_| StoreError::Poisoned)?;
        Ok(data.regulation_history.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::regulated_data;
    use leito_records::WireTimestamp;

    #[test]
    fn failed_commit_keeps_previous_state() {
        let store = MemoryStore::from_data(regulated_data());
        let before = store.load().expect("load");

        let mut batch = StagedWrites::default();
        batch.patients.push(crate::regulation::PatientUpdate {
            patient_id: "ghost".into(),
            bed_id: None,
            sector_id: None,
            clear_active_regulation: true,
            clear_icu_request: false,
            clear_relocation_request: false,
        });

        assert!(store.commit(batch).is_err());
        assert_eq!(store.load().expect("load"), before);
    }

    #[test]
    fn audit_is_append_only() {
        let store = MemoryStore::default();
        let entry = AuditDocument {
            id: "a1".into(),
            pagina: "Regulação de Leitos".into(),
            acao: "teste".into(),
            timestamp: WireTimestamp::Millis(0),
            user_name: "Enf. Ana".into(),
        };
        store.append_audit(&[entry.clone()]).expect("append");
        store.append_audit(&[entry]).expect("append");
        assert_eq!(store.audit_trail().expect("trail").len(), 2);
    }
}
