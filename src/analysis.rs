//! Client for the external document-analysis service.
//!
//! The service is handed a bucket/key reference, never raw bytes; it reads the
//! object from storage itself and returns typed content blocks. Ingestion
//! requests table and form extraction alongside plain text, but only line
//! blocks feed the assembled document text.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Feature types requested from the analysis service.
pub const FEATURE_TYPES: [FeatureType; 2] = [FeatureType::Tables, FeatureType::Forms];

/// Errors returned while interacting with the analysis service.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service responded with an unexpected status code.
    #[error("Unexpected analysis response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Structured extraction features the service can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    /// Table structure extraction.
    Tables,
    /// Key/value form extraction.
    Forms,
}

/// Classification of a returned content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    /// A line of detected text.
    Line,
    /// A single detected word.
    Word,
    /// A detected table.
    Table,
    /// A cell within a detected table.
    Cell,
    /// A key/value pair from form extraction.
    KeyValueSet,
    /// Any block type this client does not model.
    #[serde(other)]
    Other,
}

/// One typed content block returned by the analysis service.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    /// Block classification.
    pub block_type: BlockType,
    /// Detected text, absent for purely structural blocks.
    #[serde(default)]
    pub text: Option<String>,
}

/// Assemble the extracted document text from analysis blocks.
///
/// Line blocks are concatenated in service order, each followed by a newline.
/// Table and key/value blocks are dropped here even though ingestion requests
/// them. Zero line blocks produce an empty string, which is still indexed.
pub fn document_text(blocks: &[Block]) -> String {
    let mut text = String::new();
    for block in blocks {
        if block.block_type == BlockType::Line
            && let Some(line) = &block.text
        {
            text.push_str(line);
            text.push('\n');
        }
    }
    text
}

/// Interface implemented by document-analysis backends.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Analyze the object at `bucket`/`key`, returning its content blocks.
    async fn analyze(&self, bucket: &str, key: &str) -> Result<Vec<Block>, AnalysisError>;
}

/// HTTP-backed analysis client.
pub struct HttpAnalysisClient {
    client: Client,
    base_url: String,
}

impl HttpAnalysisClient {
    /// Construct a client for the service at `base_url`.
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .user_agent("docuhub/0.1")
            .build()
            .expect("Failed to construct reqwest::Client for analysis");
        Self { client, base_url }
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config() -> Self {
        Self::new(crate::config::get_config().analysis_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/analyze", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    document: ObjectRef<'a>,
    feature_types: &'a [FeatureType],
}

#[derive(Serialize)]
struct ObjectRef<'a> {
    bucket: &'a str,
    key: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[async_trait]
impl DocumentAnalyzer for HttpAnalysisClient {
    async fn analyze(&self, bucket: &str, key: &str) -> Result<Vec<Block>, AnalysisError> {
        let request = AnalyzeRequest {
            document: ObjectRef { bucket, key },
            feature_types: &FEATURE_TYPES,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = AnalysisError::UnexpectedStatus { status, body };
            tracing::error!(bucket, key, error = %error, "Document analysis failed");
            return Err(error);
        }

        let payload: AnalyzeResponse = response.json().await?;
        tracing::debug!(bucket, key, blocks = payload.blocks.len(), "Document analyzed");
        Ok(payload.blocks)
    }
}
