//! Document identity and the record handed to the vector index.

/// Derive the document identifier from a storage object key.
///
/// The identifier is the portion of the key before the first `.`. Keys without
/// an extension map to themselves. Keys with multiple dots keep only the prefix
/// before the first one, so `report.v2.pdf` and `report.pdf` share an
/// identifier; the query side applies the same rule to its `filename`
/// parameter, which is what makes filtered retrieval line up.
pub fn document_id_from_key(key: &str) -> String {
    match key.split_once('.') {
        Some((id, _)) => id.to_string(),
        None => key.to_string(),
    }
}

/// Extracted document text paired with its identifying metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Identifier derived from the source object key.
    pub document_id: String,
    /// Extracted text content. May be empty when the analysis service
    /// returned no line blocks; empty documents are still indexed.
    pub text: String,
}

impl DocumentRecord {
    /// Build a record from an object key and its extracted text.
    pub fn from_key(key: &str, text: String) -> Self {
        Self {
            document_id: document_id_from_key(key),
            text,
        }
    }
}
