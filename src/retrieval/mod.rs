//! Retrieval subsystem: chunking, document ingestion, and similarity search.

/// Separator-priority chunking.
pub mod chunking;
/// Ingestion and search coordination.
pub mod service;
/// Shared retrieval types and errors.
pub mod types;

pub use chunking::{Chunk, chunk_document};
pub use service::{RetrievalOptions, RetrievalService, load_documents};
pub use types::{
    ChunkingError, Document, IngestError, IngestOutcome, IngestSummary, RetrievedContext,
    SearchError,
};
