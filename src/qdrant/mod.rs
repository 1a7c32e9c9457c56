//! Qdrant integration: the narrow index interface plus the HTTP client.

mod client;
mod filters;
mod payload;
mod types;

pub use client::QdrantIndex;
pub use filters::document_filter;
pub use types::{DocumentMatch, QdrantError};

use crate::document::DocumentRecord;
use async_trait::async_trait;

/// Narrow interface over the vector index used by the pipeline.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection when missing and make `document_id` filterable.
    async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError>;

    /// Store one document record under its deterministic point id.
    async fn upsert_document(
        &self,
        collection_name: &str,
        document: &DocumentRecord,
        vector: Vec<f32>,
    ) -> Result<(), QdrantError>;

    /// Similarity-search records whose `document_id` equals the given identifier.
    async fn search_document(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<DocumentMatch>, QdrantError>;
}
