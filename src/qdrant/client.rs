//! HTTP client wrapper for interacting with Qdrant.

use crate::document::DocumentRecord;
use crate::qdrant::{
    VectorIndex,
    filters::document_filter,
    payload::{build_payload, current_timestamp_rfc3339, point_id_for},
    types::{DocumentMatch, QdrantError, QueryResponse, QueryResponseResult},
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantIndex {
    /// Construct a new client for the cluster at `base_url`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("docuhub/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a collection only when it is missing from Qdrant.
    async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection created");
        })
        .await
    }

    /// Ensure the `document_id` payload field is indexed for filtering.
    async fn ensure_document_id_index(&self, collection_name: &str) -> Result<(), QdrantError> {
        let body = json!({
            "field_name": "document_id",
            "field_schema": "keyword",
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}/index"))?
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(collection = collection_name, "Payload index ensured");
        } else if response.status() == StatusCode::CONFLICT {
            tracing::debug!(collection = collection_name, "Payload index already exists");
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::warn!(collection = collection_name, error = %error, "Failed to ensure payload index");
        }

        Ok(())
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        self.create_collection_if_not_exists(collection_name, vector_size)
            .await?;
        self.ensure_document_id_index(collection_name).await
    }

    async fn upsert_document(
        &self,
        collection_name: &str,
        document: &DocumentRecord,
        vector: Vec<f32>,
    ) -> Result<(), QdrantError> {
        let now = current_timestamp_rfc3339();
        let point = json!({
            "id": point_id_for(&document.document_id),
            "vector": vector,
            "payload": build_payload(document, &now),
        });

        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": [point] }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                document_id = %document.document_id,
                "Document indexed"
            );
        })
        .await
    }

    async fn search_document(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<DocumentMatch>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": document_filter(document_id),
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| {
                let mut text = None;
                let mut document_id = None;
                if let Some(mut map) = point.payload {
                    if let Some(Value::String(value)) = map.remove("text") {
                        text = Some(value);
                    }
                    if let Some(Value::String(value)) = map.remove("document_id") {
                        document_id = Some(value);
                    }
                }
                DocumentMatch {
                    id: stringify_point_id(point.id),
                    score: point.score,
                    text,
                    document_id,
                }
            })
            .collect();

        Ok(results)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, Method::PUT, MockServer};
    use reqwest::Client;

    fn index_for(server: &MockServer) -> QdrantIndex {
        QdrantIndex {
            client: Client::builder()
                .user_agent("docuhub-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: Some("qdrant-key".into()),
        }
    }

    #[tokio::test]
    async fn search_document_emits_filter_and_parses_matches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docuhub-vectors/points/query")
                    .header("api-key", "qdrant-key")
                    .json_body_partial(
                        json!({
                            "limit": 2,
                            "filter": {
                                "must": [
                                    { "key": "document_id", "match": { "value": "report" } }
                                ]
                            }
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "point-1",
                            "score": 0.42,
                            "payload": {
                                "text": "Revenue up",
                                "document_id": "report"
                            }
                        }
                    ]
                }));
            })
            .await;

        let results = index_for(&server)
            .search_document("docuhub-vectors", vec![0.1, 0.2], "report", 2)
            .await
            .expect("search request");

        mock.assert();
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.id, "point-1");
        assert!((hit.score - 0.42).abs() < f32::EPSILON);
        assert_eq!(hit.text.as_deref(), Some("Revenue up"));
        assert_eq!(hit.document_id.as_deref(), Some("report"));
    }

    #[tokio::test]
    async fn search_document_returns_empty_for_no_matches() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docuhub-vectors/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "points": [] }
                }));
            })
            .await;

        let results = index_for(&server)
            .search_document("docuhub-vectors", vec![0.1], "missing", 2)
            .await
            .expect("search request");

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn upsert_document_uses_deterministic_point_id() {
        let server = MockServer::start_async().await;
        let expected_id = crate::qdrant::payload::point_id_for("report");
        let mock = server
            .mock_async(move |when, then| {
                when.method(PUT)
                    .path("/collections/docuhub-vectors/points")
                    .query_param("wait", "true")
                    .body_contains(&expected_id);
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let document = DocumentRecord {
            document_id: "report".into(),
            text: "Revenue up\n".into(),
        };
        index_for(&server)
            .upsert_document("docuhub-vectors", &document, vec![0.1, 0.2])
            .await
            .expect("upsert request");

        mock.assert();
    }

    #[tokio::test]
    async fn upsert_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docuhub-vectors/points");
                then.status(503).body("unavailable");
            })
            .await;

        let document = DocumentRecord {
            document_id: "report".into(),
            text: String::new(),
        };
        let error = index_for(&server)
            .upsert_document("docuhub-vectors", &document, vec![0.1])
            .await
            .expect_err("error response");

        assert!(
            matches!(&error, QdrantError::UnexpectedStatus { status, .. } if status.as_u16() == 503)
        );
    }
}
