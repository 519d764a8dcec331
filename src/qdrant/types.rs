//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Prepared point ready for indexing: one chunk with its vector and provenance.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    /// Raw chunk text, including any overlap prefix.
    pub text: String,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
    /// Title of the source document.
    pub source: String,
    /// Ordinal position of the chunk within its document.
    pub chunk_index: usize,
    /// Deterministic chunk label of the form `{title}_{index}`.
    pub label: String,
    /// Stable digest of the chunk text used for within-document dedupe.
    pub chunk_hash: String,
}

/// A chunk returned from similarity search, ordered by ascending distance.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Identifier assigned to the point at indexing time.
    pub id: String,
    /// Cosine distance between the query and the chunk (lower is closer).
    pub distance: f32,
    /// Stored chunk text.
    pub text: String,
    /// Title of the source document, if stored.
    pub source: Option<String>,
    /// Ordinal chunk position, if stored.
    pub chunk_index: Option<usize>,
    /// Chunk label, if stored.
    pub label: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
