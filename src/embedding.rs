//! Embedding client abstraction and the hosted-API adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned no vector for the input text.
    #[error("Embedding provider returned no vectors")]
    EmptyResponse,
    /// Returned vector does not match the configured dimensionality.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the index.
        expected: usize,
        /// Dimension actually produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for the supplied text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Client for an OpenAI-style `/v1/embeddings` endpoint.
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    /// Construct a client authenticated with `api_key` against `base_url`.
    pub fn new(base_url: String, api_key: String, model: String, dimension: usize) -> Self {
        let client = Client::builder()
            .user_agent("docuhub/0.1")
            .build()
            .expect("Failed to construct reqwest::Client for embeddings");
        Self {
            client,
            base_url,
            api_key,
            model,
            dimension,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tracing::debug!(model = %self.model, chars = text.len(), "Generating embedding");
        let payload = json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = EmbeddingError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Embedding request failed");
            return Err(error);
        }

        let mut body: EmbeddingResponse = response.json().await?;
        let vector = match body.data.pop() {
            Some(data) => data.embedding,
            None => return Err(EmbeddingError::EmptyResponse),
        };

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer, dimension: usize) -> HttpEmbeddingClient {
        HttpEmbeddingClient::new(
            server.base_url(),
            "sk-test".into(),
            "text-embedding-3-small".into(),
            dimension,
        )
    }

    #[tokio::test]
    async fn embed_returns_vector_from_provider() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer sk-test")
                    .json_body(json!({
                        "model": "text-embedding-3-small",
                        "input": "hello"
                    }));
                then.status(200).json_body(json!({
                    "data": [{ "embedding": [0.1, 0.2, 0.3] }]
                }));
            })
            .await;

        let vector = client_for(&server, 3).embed("hello").await.expect("vector");

        mock.assert();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_rejects_dimension_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({
                    "data": [{ "embedding": [0.1, 0.2] }]
                }));
            })
            .await;

        let error = client_for(&server, 3)
            .embed("hello")
            .await
            .expect_err("dimension mismatch");

        assert!(matches!(
            error,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn embed_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(429).body("rate limited");
            })
            .await;

        let error = client_for(&server, 3)
            .embed("hello")
            .await
            .expect_err("error response");

        assert!(
            matches!(&error, EmbeddingError::UnexpectedStatus { status, .. } if status.as_u16() == 429)
        );
    }

    #[tokio::test]
    async fn empty_data_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;

        let error = client_for(&server, 3)
            .embed("hello")
            .await
            .expect_err("empty response");

        assert!(matches!(error, EmbeddingError::EmptyResponse));
    }
}
