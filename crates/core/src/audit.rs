//! Audit trail entries.

use crate::constants::AUDIT_PAGE_REGULATION;
use chrono::{DateTime, Utc};
use leito_records::{AuditDocument, WireTimestamp};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: Uuid,
    /// Page or category the action belongs to.
    pub page: String,
    pub action: String,
    pub at: DateTime<Utc>,
    pub user_name: String,
}

impl AuditEntry {
    pub fn new(page: &str, action: String, at: DateTime<Utc>, user_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            page: page.to_string(),
            action,
            at,
            user_name: user_name.to_string(),
        }
    }

    /// One entry per line of regulation audit text.
    pub fn regulation_lines(lines: &[String], at: DateTime<Utc>, user_name: &str) -> Vec<Self> {
        lines
            .iter()
            .map(|line| Self::new(AUDIT_PAGE_REGULATION, line.clone(), at, user_name))
            .collect()
    }

    pub fn to_document(&self) -> AuditDocument {
        AuditDocument {
            id: self.id.to_string(),
            pagina: self.page.clone(),
            acao: self.action.clone(),
            timestamp: WireTimestamp::from_datetime(self.at),
            user_name: self.user_name.clone(),
        }
    }
}
