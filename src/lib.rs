#![deny(missing_docs)]

//! Core library for the Fournil bakery assistant.

/// Agent stages of the query pipeline.
pub mod agents;
/// HTTP prediction surface.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion client for the Groq endpoint.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and query counters.
pub mod metrics;
/// Fixed linear pipeline orchestration.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
/// Chunking, ingestion, and similarity search.
pub mod retrieval;
/// External tools available to the agents.
pub mod tools;
