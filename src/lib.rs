#![deny(missing_docs)]

//! Core library for the DocuHub document question-answering service.

/// Document-analysis client and text assembly.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Document identifier derivation and the document record type.
pub mod document;
/// Embedding client abstraction and HTTP adapter.
pub mod embedding;
/// Chat-completion client used to synthesize answers.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and query counters.
pub mod metrics;
/// Ingestion and query pipeline services.
pub mod pipeline;
/// Qdrant vector index integration.
pub mod qdrant;
/// Secret store client resolving service credentials.
pub mod secrets;
