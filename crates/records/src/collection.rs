//! Parsing and rendering of whole collections.
//!
//! Exports arrive either as a JSON list of documents or as a map keyed by document id
//! (the store's native export shape). Keyed entries may omit `id`; the key fills it in.

use crate::documents::Document;
use crate::{RecordError, RecordResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Collection operations.
///
/// This is a zero-sized type used for namespacing collection-level operations.
pub struct Collection;

impl Collection {
    /// Parse a collection from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if:
    /// - the text is not valid JSON,
    /// - the top level is neither a list nor a keyed map,
    /// - any document does not match its wire schema (the message names the field path),
    /// - a listed document carries no id.
    pub fn parse_json<T>(text: &str) -> RecordResult<Vec<T>>
    where
        T: Document + DeserializeOwned,
    {
        let value: Value = serde_json::from_str(text)?;
        entries_from_value(value)
    }

    /// Parse a single document from JSON text.
    pub fn parse_document_json<T>(text: &str) -> RecordResult<T>
    where
        T: Document + DeserializeOwned,
    {
        let value: Value = serde_json::from_str(text)?;
        decode(value, "<document>")
    }

    /// Render a collection as a pretty-printed JSON list.
    pub fn render_json<T>(documents: &[T]) -> RecordResult<String>
    where
        T: Document + Serialize,
    {
        serde_json::to_string_pretty(documents).map_err(|e| {
            RecordError::Translation(format!("Failed to serialise {} collection: {e}", T::KIND))
        })
    }

    /// Render one document as a single JSON line (append-only logs).
    pub fn render_line<T>(document: &T) -> RecordResult<String>
    where
        T: Document + Serialize,
    {
        serde_json::to_string(document).map_err(|e| {
            RecordError::Translation(format!("Failed to serialise {}: {e}", T::KIND))
        })
    }
}

fn entries_from_value<T>(value: Value) -> RecordResult<Vec<T>>
where
    T: Document + DeserializeOwned,
{
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let location = format!("[{index}]");
                let document: T = decode(item, &location)?;
                if document.id().trim().is_empty() {
                    return Err(RecordError::InvalidInput(format!(
                        "{} at {location} has no id",
                        T::KIND
                    )));
                }
                Ok(document)
            })
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, item)| {
                let mut document: T = decode(item, &key)?;
                if document.id().trim().is_empty() {
                    document.set_id(key);
                }
                Ok(document)
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(RecordError::InvalidInput(format!(
            "expected a list or a keyed map of {} documents, got {}",
            T::KIND,
            value_kind(&other)
        ))),
    }
}

fn decode<T>(value: Value, location: &str) -> RecordResult<T>
where
    T: Document + DeserializeOwned,
{
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        RecordError::Translation(format!(
            "{} {location} schema mismatch at {path}: {source}",
            T::KIND
        ))
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
