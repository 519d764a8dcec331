//! Qdrant vector store integration.
//!
//! A lightweight reqwest wrapper around the Qdrant REST API. The collection holds one
//! point per chunk (cosine metric); payloads carry the chunk text and its provenance.
//! Similarity results are converted to cosine distances and gated by a maximum
//! distance before anything reaches the agents.

mod client;
mod payload;
mod types;

pub use client::QdrantService;
pub use payload::compute_chunk_hash;
pub use types::{ChunkPoint, QdrantError, RetrievedChunk};
