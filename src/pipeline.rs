//! Ingestion and query services coordinating secrets, analysis, embedding,
//! the vector index, and answer generation.

use crate::{
    analysis::{self, AnalysisError, DocumentAnalyzer, HttpAnalysisClient},
    config::{DEFAULT_CHAT_MODEL, DEFAULT_OPENAI_URL, get_config},
    document::DocumentRecord,
    embedding::{EmbeddingClient, EmbeddingError, HttpEmbeddingClient},
    generation::{AnswerRequest, ChatClient, GenerationError, HttpChatClient},
    metrics::{MetricsSnapshot, PipelineMetrics},
    qdrant::{QdrantError, QdrantIndex, VectorIndex},
    secrets::{EmbeddingCredentials, HttpSecretStore, IndexCredentials, SecretError, SecretStore},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Maximum number of matches retrieved for a query.
pub const MATCH_LIMIT: usize = 2;

/// Errors emitted by the ingestion and query pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Credential resolution against the secret store failed.
    #[error("Failed to resolve credentials: {0}")]
    Secrets(#[from] SecretError),
    /// Document analysis failed or returned an error response.
    #[error("Document analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    /// Embedding provider failed to produce a vector.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector index interaction failed.
    #[error("Vector index request failed: {0}")]
    Index(#[from] QdrantError),
    /// Answer generation failed.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationError),
}

/// One storage-upload notification record.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRecord {
    /// Bucket named by the notification. The analysis call uses the
    /// configured bucket; the record field is carried for the trigger shape.
    pub bucket: String,
    /// Object key of the uploaded document.
    pub key: String,
}

/// Summary of a completed ingestion invocation.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    /// Number of records processed and upserted.
    pub documents_ingested: usize,
}

/// Result of a query invocation.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// The filtered similarity search returned zero matches.
    NoMatch,
    /// An answer was synthesized from the retrieved passages.
    Answered(String),
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Process a batch of upload notifications sequentially.
    async fn ingest(&self, records: Vec<UploadRecord>) -> Result<IngestOutcome, PipelineError>;

    /// Answer a query against the document derived from `filename`.
    async fn query(&self, filename: &str, query: &str) -> Result<QueryOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Builds service clients from credentials resolved at invocation time.
///
/// Credentials only exist for the duration of one handler invocation, so the
/// clients that need them are constructed per invocation through this seam;
/// tests substitute fakes without touching the network.
pub trait ClientFactory: Send + Sync {
    /// Build an embedding client from the embedding-service credentials.
    fn embedding_client(&self, credentials: &EmbeddingCredentials) -> Box<dyn EmbeddingClient>;

    /// Build a vector index handle from the index credentials.
    fn vector_index(&self, credentials: &IndexCredentials) -> Result<Box<dyn VectorIndex>, QdrantError>;

    /// Build a chat client from the embedding-service credentials.
    fn chat_client(&self, credentials: &EmbeddingCredentials) -> Box<dyn ChatClient>;
}

/// Factory producing the HTTP-backed clients used in production.
pub struct HttpClientFactory {
    embedding_url: String,
    chat_url: String,
    embedding_model: String,
    embedding_dimension: usize,
    chat_model: String,
}

impl HttpClientFactory {
    /// Construct a factory from the loaded configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            embedding_url: config
                .embedding_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            chat_url: config
                .chat_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            embedding_model: config.embedding_model.clone(),
            embedding_dimension: config.embedding_dimension,
            chat_model: config
                .chat_model
                .clone()
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn embedding_client(&self, credentials: &EmbeddingCredentials) -> Box<dyn EmbeddingClient> {
        Box::new(HttpEmbeddingClient::new(
            self.embedding_url.clone(),
            credentials.api_key.clone(),
            self.embedding_model.clone(),
            self.embedding_dimension,
        ))
    }

    fn vector_index(&self, credentials: &IndexCredentials) -> Result<Box<dyn VectorIndex>, QdrantError> {
        let index = QdrantIndex::new(&credentials.environment, Some(credentials.api_key.clone()))?;
        Ok(Box::new(index))
    }

    fn chat_client(&self, credentials: &EmbeddingCredentials) -> Box<dyn ChatClient> {
        Box::new(HttpChatClient::new(
            self.chat_url.clone(),
            credentials.api_key.clone(),
            self.chat_model.clone(),
        ))
    }
}

/// Names and sizes the pipeline needs per invocation.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Secret name holding the embedding/chat API key.
    pub embedding_secret_name: String,
    /// Secret name holding the vector index credentials.
    pub index_secret_name: String,
    /// Bucket handed to the analysis service for every record.
    pub bucket: String,
    /// Vector index collection documents are stored in.
    pub index_name: String,
    /// Vector size used when bootstrapping the collection.
    pub vector_size: u64,
}

impl PipelineSettings {
    /// Construct settings from the loaded configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            embedding_secret_name: config.embedding_secret_name.clone(),
            index_secret_name: config.index_secret_name.clone(),
            bucket: config.bucket_name.clone(),
            index_name: config.index_name.clone(),
            vector_size: config.embedding_dimension as u64,
        }
    }
}

/// Coordinates both handlers over injected collaborators.
///
/// The service owns the secret store, the analysis client, and the factory
/// that turns per-invocation credentials into embedding/index/chat clients.
/// Construct it once near process start and share it through an `Arc`.
pub struct PipelineService {
    secrets: Box<dyn SecretStore>,
    analyzer: Box<dyn DocumentAnalyzer>,
    clients: Box<dyn ClientFactory>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineService {
    /// Build a service over explicit collaborators.
    pub fn new(
        secrets: Box<dyn SecretStore>,
        analyzer: Box<dyn DocumentAnalyzer>,
        clients: Box<dyn ClientFactory>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            secrets,
            analyzer,
            clients,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build the production service from the loaded configuration.
    pub fn from_config() -> Self {
        Self::new(
            Box::new(HttpSecretStore::from_config()),
            Box::new(HttpAnalysisClient::from_config()),
            Box::new(HttpClientFactory::from_config()),
            PipelineSettings::from_config(),
        )
    }

    /// Resolve both service secrets for this invocation.
    async fn resolve_credentials(
        &self,
    ) -> Result<(EmbeddingCredentials, IndexCredentials), PipelineError> {
        let embedding =
            EmbeddingCredentials::resolve(&*self.secrets, &self.settings.embedding_secret_name)
                .await?;
        let index =
            IndexCredentials::resolve(&*self.secrets, &self.settings.index_secret_name).await?;
        Ok((embedding, index))
    }

    /// Extract, embed, and index every record in the batch, in order.
    pub async fn ingest(
        &self,
        records: Vec<UploadRecord>,
    ) -> Result<IngestOutcome, PipelineError> {
        let (embedding_creds, index_creds) = self.resolve_credentials().await?;
        let embeddings = self.clients.embedding_client(&embedding_creds);
        let index = self.clients.vector_index(&index_creds)?;

        index
            .ensure_collection(&self.settings.index_name, self.settings.vector_size)
            .await?;

        let mut documents_ingested = 0;
        for record in &records {
            tracing::info!(key = %record.key, "Processing uploaded document");
            let blocks = self
                .analyzer
                .analyze(&self.settings.bucket, &record.key)
                .await?;
            let text = analysis::document_text(&blocks);
            let document = DocumentRecord::from_key(&record.key, text);

            let vector = embeddings.embed(&document.text).await?;
            index
                .upsert_document(&self.settings.index_name, &document, vector)
                .await?;

            self.metrics.record_document();
            documents_ingested += 1;
            tracing::info!(
                key = %record.key,
                document_id = %document.document_id,
                "Document stored in vector index"
            );
        }

        Ok(IngestOutcome { documents_ingested })
    }

    /// Retrieve passages for the document derived from `filename` and answer.
    pub async fn query(&self, filename: &str, query: &str) -> Result<QueryOutcome, PipelineError> {
        let (embedding_creds, index_creds) = self.resolve_credentials().await?;
        let document_id = crate::document::document_id_from_key(filename);
        let embeddings = self.clients.embedding_client(&embedding_creds);
        let index = self.clients.vector_index(&index_creds)?;

        let vector = embeddings.embed(query).await?;
        let matches = index
            .search_document(&self.settings.index_name, vector, &document_id, MATCH_LIMIT)
            .await?;

        if matches.is_empty() {
            tracing::info!(document_id = %document_id, "No matches for query");
            return Ok(QueryOutcome::NoMatch);
        }

        let context: Vec<String> = matches.into_iter().filter_map(|hit| hit.text).collect();
        let chat = self.clients.chat_client(&embedding_creds);
        let answer = chat
            .generate_answer(AnswerRequest {
                context,
                question: query.to_string(),
            })
            .await?;

        self.metrics.record_answer();
        tracing::info!(document_id = %document_id, "Query answered");
        Ok(QueryOutcome::Answered(answer))
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn ingest(&self, records: Vec<UploadRecord>) -> Result<IngestOutcome, PipelineError> {
        PipelineService::ingest(self, records).await
    }

    async fn query(&self, filename: &str, query: &str) -> Result<QueryOutcome, PipelineError> {
        PipelineService::query(self, filename, query).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }
}
