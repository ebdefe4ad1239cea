//! Wire models of the documents held by the external store.
//!
//! These structs mirror the store's field names (Portuguese, camelCase). Reference fields are
//! flattened to plain ids at deserialization time (see [`crate::reference`]); temporal fields
//! keep their wire encoding ([`WireTimestamp`]) and are interpreted by the core.
//!
//! Documents are parsed leniently: unknown keys are ignored because the store is shared with
//! other workflows that add their own fields.

use crate::reference;
use crate::timestamp::WireTimestamp;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A document that lives in a keyed collection.
pub trait Document {
    /// Human-readable collection name used in error messages.
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

macro_rules! impl_document {
    ($ty:ty, $kind:literal) => {
        impl Document for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

/// `pacientes` collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_completo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sexo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_nascimento: Option<WireTimestamp>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub leito_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub setor_id: Option<String>,
    /// Non-object entries (`null`, `false`, `""`, `0`, ...) read as `None` and are dropped
    /// during normalization.
    #[serde(
        default,
        deserialize_with = "isolation_entries",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub isolamentos: Vec<Option<IsolationDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulacao_ativa: Option<RegulationDocument>,
    #[serde(
        default,
        rename = "pedidoUTI",
        skip_serializing_if = "Option::is_none"
    )]
    pub pedido_uti: Option<IcuRequestDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pedido_remanejamento: Option<RelocationRequestDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setor_origem: Option<String>,
}
impl_document!(PatientDocument, "paciente");

fn isolation_entries<'de, D>(deserializer: D) -> Result<Vec<Option<IsolationDocument>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    entries
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry {
            Value::Object(_) => IsolationDocument::deserialize(entry)
                .map(Some)
                .map_err(D::Error::custom),
            _ => Ok(None),
        })
        .collect()
}

/// One entry of a patient's `isolamentos` list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationDocument {
    /// Direct infection id.
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub infeccao_id: Option<String>,
    /// Embedded infection reference, used by older documents instead of `infeccaoId`.
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub infeccao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Cached infection acronym.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigla: Option<String>,
    /// Cached infection full name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_inicio: Option<WireTimestamp>,
}

/// Active regulation embedded in a patient document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulationDocument {
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub leito_origem_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub setor_origem_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub leito_destino_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub setor_destino_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iniciado_em: Option<WireTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paciente_nome: Option<String>,
}

/// Pending ICU admission request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcuRequestDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solicitado_em: Option<WireTimestamp>,
}

/// Pending relocation request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationRequestDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solicitado_em: Option<WireTimestamp>,
}

/// `leitos` collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub codigo_leito: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub setor_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub quarto_id: Option<String>,
    /// Protected-care-pathway flag.
    #[serde(default, rename = "leitoPCP", skip_serializing_if = "Option::is_none")]
    pub leito_pcp: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub historico: Vec<StatusChangeDocument>,
}
impl_document!(BedDocument, "leito");

/// One entry of a bed's status history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeDocument {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<WireTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paciente_id: Option<String>,
}

/// `setores` collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub nome_setor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigla_setor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_setor: Option<String>,
}
impl_document!(SectorDocument, "setor");

/// `quartos` collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_quarto: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten",
        skip_serializing_if = "Option::is_none"
    )]
    pub setor_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "reference::flatten_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub leitos_ids: Vec<String>,
}
impl_document!(RoomDocument, "quarto");

/// `infeccoes` reference collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfectionDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigla_infeccao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_infeccao: Option<String>,
}
impl_document!(InfectionDocument, "infeccao");

/// `historicoRegulacoes` collection, keyed by patient id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulationHistoryDocument {
    #[serde(default)]
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paciente_nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iniciado_em: Option<WireTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_conclusao: Option<WireTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name_conclusao: Option<String>,
    /// `null` when the start timestamp was unusable.
    #[serde(default)]
    pub tempo_regulacao_minutos: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leito_origem_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setor_origem_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leito_destino_final_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setor_destino_final_id: Option<String>,
}
impl_document!(RegulationHistoryDocument, "historico de regulacao");

/// One line of the append-only audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDocument {
    pub id: String,
    pub pagina: String,
    pub acao: String,
    pub timestamp: WireTimestamp,
    pub user_name: String,
}
impl_document!(AuditDocument, "auditoria");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_document_flattens_references() {
        let json = r#"{
            "id": "p1",
            "nomeCompleto": "Maria Souza",
            "sexo": "F",
            "leitoId": {"id": "L-101", "path": "leitos/L-101"},
            "setorId": "S-ENF",
            "isolamentos": [
                {"infeccao": {"id": "inf-mrsa"}, "status": "Confirmado"},
                null
            ],
            "pedidoUTI": {"solicitadoEm": "2024-05-01T10:00:00Z"},
            "campoDesconhecido": 42
        }"#;

        let doc: PatientDocument = serde_json::from_str(json).expect("parse patient");
        assert_eq!(doc.leito_id.as_deref(), Some("L-101"));
        assert_eq!(doc.setor_id.as_deref(), Some("S-ENF"));
        assert_eq!(doc.isolamentos.len(), 2);
        let first = doc.isolamentos[0].as_ref().expect("first isolation");
        assert_eq!(first.infeccao.as_deref(), Some("inf-mrsa"));
        assert!(doc.isolamentos[1].is_none());
        assert!(doc.pedido_uti.is_some());
    }

    #[test]
    fn odd_isolation_entries_and_timestamps_do_not_fail_the_document() {
        let json = r#"{
            "id": "p2",
            "dataNascimento": true,
            "isolamentos": [false, "", 0, {"infeccaoId": "vre", "status": "Suspeito"}],
            "regulacaoAtiva": {"leitoDestinoId": "L-2", "iniciadoEm": {"toDate": null}}
        }"#;

        let doc: PatientDocument = serde_json::from_str(json).expect("parse patient");
        assert_eq!(doc.data_nascimento.as_ref().and_then(|ts| ts.to_date()), None);
        assert_eq!(doc.isolamentos.len(), 4);
        assert!(doc.isolamentos[..3].iter().all(Option::is_none));
        assert_eq!(
            doc.isolamentos[3].as_ref().and_then(|i| i.infeccao_id.as_deref()),
            Some("vre")
        );
        let regulation = doc.regulacao_ativa.expect("regulation");
        assert_eq!(
            regulation.iniciado_em.as_ref().and_then(|ts| ts.to_datetime()),
            None
        );

        let doc: PatientDocument =
            serde_json::from_str(r#"{"id": "p3", "isolamentos": null}"#).expect("parse patient");
        assert!(doc.isolamentos.is_empty());
    }

    #[test]
    fn bed_document_reads_protected_flag_and_history() {
        let json = r#"{
            "id": "L-101",
            "codigoLeito": "101A",
            "status": "Vago",
            "setorId": {"path": "setores/S-ENF"},
            "leitoPCP": true,
            "historico": [{"status": "Higienização", "timestamp": 1700000000000}]
        }"#;

        let doc: BedDocument = serde_json::from_str(json).expect("parse bed");
        assert_eq!(doc.setor_id.as_deref(), Some("S-ENF"));
        assert_eq!(doc.leito_pcp, Some(true));
        assert_eq!(doc.historico.len(), 1);
    }

    #[test]
    fn rendering_writes_plain_ids() {
        let doc = BedDocument {
            id: "L-1".into(),
            codigo_leito: "101A".into(),
            setor_id: Some("S-1".into()),
            leito_pcp: Some(false),
            ..Default::default()
        };

        let value = serde_json::to_value(&doc).expect("render bed");
        assert_eq!(value["setorId"], "S-1");
        assert_eq!(value["leitoPCP"], false);
        assert!(value.get("quartoId").is_none());
    }

    #[test]
    fn history_document_keeps_null_duration() {
        let doc = RegulationHistoryDocument {
            id: "p1".into(),
            status: "Concluída".into(),
            tempo_regulacao_minutos: None,
            ..Default::default()
        };

        let value = serde_json::to_value(&doc).expect("render history");
        assert!(value["tempoRegulacaoMinutos"].is_null());
    }
}
