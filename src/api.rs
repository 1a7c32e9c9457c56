//! HTTP surface for DocuHub.
//!
//! This module exposes a compact Axum router with three endpoints:
//!
//! - `POST /ingest` – Accept a batch of storage-upload notification records,
//!   extract and embed each document, and store it in the vector index.
//!   Returns a fixed confirmation message once every record is processed.
//! - `GET /query` – Answer a natural-language query against a single ingested
//!   document (`filename` + `query` parameters). Returns `{"answer": ...}` on
//!   success, or 404 with a fixed body when the filtered search finds nothing.
//! - `GET /metrics` – Observe ingestion and query counters.
//!
//! Failures other than the explicit no-match branch surface as a 500 carrying
//! the error's display string.

use crate::metrics::MetricsSnapshot;
use crate::pipeline::{PipelineApi, PipelineError, QueryOutcome, UploadRecord};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed confirmation body returned by a successful ingestion.
const INGEST_CONFIRMATION: &str = "Documents processed and stored in the vector index.";

/// Fixed body returned when the filtered search yields no matches.
const NOT_FOUND_MESSAGE: &str = "Document not found.";

/// Build the HTTP router exposing both pipeline handlers.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/ingest", post(ingest_documents::<S>))
        .route("/query", get(query_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Request body for the `POST /ingest` endpoint.
#[derive(Deserialize)]
struct IngestRequest {
    /// Upload notification records, processed strictly in order.
    records: Vec<UploadRecord>,
}

/// Fixed-shape message response used by ingestion and the 404 branch.
#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Process a batch of upload notifications.
async fn ingest_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<MessageResponse>, AppError>
where
    S: PipelineApi,
{
    let outcome = service.ingest(request.records).await?;
    tracing::info!(
        documents = outcome.documents_ingested,
        "Ingest request completed"
    );
    Ok(Json(MessageResponse {
        message: INGEST_CONFIRMATION,
    }))
}

/// Query parameters for the `GET /query` endpoint.
#[derive(Deserialize)]
struct QueryParams {
    /// Original filename of the ingested document.
    filename: String,
    /// Natural-language question to answer.
    query: String,
}

/// Response body for a successfully answered query.
#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

/// Answer a query scoped to one ingested document.
async fn query_document<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<QueryParams>,
) -> Result<Response, AppError>
where
    S: PipelineApi,
{
    let outcome = service.query(&params.filename, &params.query).await?;
    match outcome {
        QueryOutcome::NoMatch => Ok((
            StatusCode::NOT_FOUND,
            Json(MessageResponse {
                message: NOT_FOUND_MESSAGE,
            }),
        )
            .into_response()),
        QueryOutcome::Answered(answer) => Ok(Json(AnswerResponse { answer }).into_response()),
    }
}

/// Return a concise metrics snapshot with ingestion and query counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(PipelineError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::metrics::MetricsSnapshot;
    use crate::pipeline::{
        IngestOutcome, PipelineApi, PipelineError, QueryOutcome, UploadRecord,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn ingest_route_returns_fixed_confirmation() {
        let service = Arc::new(StubPipeline::new(QueryOutcome::NoMatch));
        let app = create_router(service.clone());

        let payload = json!({
            "records": [
                { "bucket": "uploads", "key": "report.pdf" },
                { "bucket": "uploads", "key": "invoice.v2.pdf" }
            ]
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(
            json["message"],
            "Documents processed and stored in the vector index."
        );

        let records = service.recorded_records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "report.pdf");
        assert_eq!(records[1].key, "invoice.v2.pdf");
    }

    #[tokio::test]
    async fn query_route_returns_answer_payload() {
        let service = Arc::new(StubPipeline::new(QueryOutcome::Answered(
            "the total is 42".into(),
        )));
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/query?filename=report.pdf&query=what%20is%20the%20total")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["answer"], "the total is 42");

        let queries = service.recorded_queries().await;
        assert_eq!(
            queries,
            vec![("report.pdf".to_string(), "what is the total".to_string())]
        );
    }

    #[tokio::test]
    async fn query_route_maps_no_match_to_404() {
        let service = Arc::new(StubPipeline::new(QueryOutcome::NoMatch));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/query?filename=missing.pdf&query=anything")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["message"], "Document not found.");
    }

    #[tokio::test]
    async fn query_route_requires_both_parameters() {
        let service = Arc::new(StubPipeline::new(QueryOutcome::NoMatch));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/query?filename=report.pdf")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_route_reports_counters() {
        let service = Arc::new(StubPipeline::new(QueryOutcome::NoMatch));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["documents_ingested"], 0);
        assert_eq!(json["queries_answered"], 0);
    }

    struct StubPipeline {
        records: Mutex<Vec<UploadRecord>>,
        queries: Mutex<Vec<(String, String)>>,
        outcome: QueryOutcome,
    }

    impl StubPipeline {
        fn new(outcome: QueryOutcome) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                queries: Mutex::new(Vec::new()),
                outcome,
            }
        }

        async fn recorded_records(&self) -> Vec<UploadRecord> {
            self.records.lock().await.clone()
        }

        async fn recorded_queries(&self) -> Vec<(String, String)> {
            self.queries.lock().await.clone()
        }
    }

    #[async_trait]
    impl PipelineApi for StubPipeline {
        async fn ingest(
            &self,
            records: Vec<UploadRecord>,
        ) -> Result<IngestOutcome, PipelineError> {
            let count = records.len();
            self.records.lock().await.extend(records);
            Ok(IngestOutcome {
                documents_ingested: count,
            })
        }

        async fn query(
            &self,
            filename: &str,
            query: &str,
        ) -> Result<QueryOutcome, PipelineError> {
            self.queries
                .lock()
                .await
                .push((filename.to_string(), query.to_string()));
            Ok(self.outcome.clone())
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 0,
                queries_answered: 0,
            }
        }
    }
}
