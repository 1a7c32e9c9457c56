//! Helpers for constructing Qdrant point ids and payloads.

use crate::document::DocumentRecord;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside the document vector.
pub(crate) fn build_payload(document: &DocumentRecord, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "document_id".into(),
        Value::String(document.document_id.clone()),
    );
    payload.insert("text".into(), Value::String(document.text.clone()));
    payload.insert(
        "ingested_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Deterministic point id for a document identifier.
///
/// Re-ingesting a key that derives the same identifier overwrites the prior
/// point, so the index holds one record per document id.
pub(crate) fn point_id_for(document_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, document_id.as_bytes()).to_string()
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
