//! Filter helpers for Qdrant search queries.

use serde_json::{Value, json};

/// Compose the filter restricting a search to a single document identifier.
pub fn document_filter(document_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "document_id",
                "match": { "value": document_id }
            }
        ]
    })
}
