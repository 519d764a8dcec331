//! Core data types and error definitions for the retrieval pipeline.

use crate::{embedding::EmbeddingError, qdrant::QdrantError};
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted by the document ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Qdrant interaction failed during ingestion.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

/// Errors emitted while orchestrating similarity searches.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Embedding provider failed to return a vector for the query text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Qdrant search request returned an error response.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured for the collection.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
}

/// A raw document loaded from the corpus directory.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source identifier, taken from the file name.
    pub title: String,
    /// Full text content.
    pub text: String,
}

/// Summary of a completed document ingestion.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    /// Number of chunks indexed for the document.
    pub chunk_count: usize,
    /// Chunks skipped within the document due to duplicate content.
    pub skipped_duplicates: usize,
}

/// Summary of a directory-wide ingestion pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSummary {
    /// Documents successfully indexed.
    pub documents: usize,
    /// Total chunks indexed across all documents.
    pub chunks: usize,
    /// Documents dropped because loading or indexing failed.
    pub failures: usize,
}

/// Tagged outcome of context retrieval for a question.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedContext {
    /// At least one chunk passed the relevance gate; the concatenated context text.
    Found(String),
    /// No chunk was close enough to the query.
    NotFound,
}

impl RetrievedContext {
    /// Context text for prompt construction; empty when nothing was found.
    pub fn as_text(&self) -> &str {
        match self {
            Self::Found(text) => text,
            Self::NotFound => "",
        }
    }

    /// Whether retrieval produced usable context.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}
