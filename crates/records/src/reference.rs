//! Reference fields of the document store.
//!
//! A document may point at another document either by a plain id string or by an embedded
//! reference object (`{ "id": "abc", "path": "leitos/abc" }`). Both shapes are accepted on
//! the way in and flattened to the plain id, so nothing past this crate ever sees a reference
//! object. Rendering always writes the plain id.

use serde::{Deserialize, Deserializer, Serialize};

/// Either shape a reference field may take on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    /// Plain id string.
    Id(String),
    /// Embedded reference object.
    Embedded(EmbeddedReference),
}

/// Embedded reference object as exported by the document store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Reference {
    /// The referenced document id, if one can be recovered.
    ///
    /// Embedded references prefer `id`; otherwise the last segment of `path` is used.
    /// Blank ids count as absent.
    pub fn into_id(self) -> Option<String> {
        let candidate = match self {
            Reference::Id(id) => Some(id),
            Reference::Embedded(embedded) => embedded.id.filter(|id| !id.trim().is_empty()).or(
                embedded
                    .path
                    .and_then(|path| path.rsplit('/').next().map(str::to_string)),
            ),
        };

        candidate
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    }
}

/// `deserialize_with` helper: optional reference field flattened to an optional id.
pub fn flatten<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let reference = Option::<Reference>::deserialize(deserializer)?;
    Ok(reference.and_then(Reference::into_id))
}

/// `deserialize_with` helper: list of references flattened to ids, unresolvable entries dropped.
pub fn flatten_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let references = Option::<Vec<Option<Reference>>>::deserialize(deserializer)?;
    Ok(references
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(Reference::into_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "flatten")]
        leito: Option<String>,
        #[serde(default, deserialize_with = "flatten_list")]
        leitos: Vec<String>,
    }

    #[test]
    fn plain_id_is_kept() {
        let holder: Holder = serde_json::from_str(r#"{"leito": "L-101"}"#).expect("parse");
        assert_eq!(holder.leito.as_deref(), Some("L-101"));
    }

    #[test]
    fn embedded_reference_is_unwrapped() {
        let holder: Holder =
            serde_json::from_str(r#"{"leito": {"id": "L-102", "path": "leitos/L-102"}}"#)
                .expect("parse");
        assert_eq!(holder.leito.as_deref(), Some("L-102"));
    }

    #[test]
    fn path_only_reference_uses_last_segment() {
        let holder: Holder =
            serde_json::from_str(r#"{"leito": {"path": "leitos/L-103"}}"#).expect("parse");
        assert_eq!(holder.leito.as_deref(), Some("L-103"));
    }

    #[test]
    fn null_and_blank_references_are_absent() {
        let holder: Holder = serde_json::from_str(r#"{"leito": null}"#).expect("parse");
        assert_eq!(holder.leito, None);

        let holder: Holder = serde_json::from_str(r#"{"leito": "  "}"#).expect("parse");
        assert_eq!(holder.leito, None);

        let holder: Holder = serde_json::from_str("{}").expect("parse");
        assert_eq!(holder.leito, None);
    }

    #[test]
    fn reference_lists_drop_unresolvable_entries() {
        let holder: Holder = serde_json::from_str(
            r#"{"leitos": ["L-1", {"id": "L-2"}, null, {"path": "leitos/L-3"}, {}]}"#,
        )
        .expect("parse");
        assert_eq!(holder.leitos, vec!["L-1", "L-2", "L-3"]);
    }
}
