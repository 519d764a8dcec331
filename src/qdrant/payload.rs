//! Helpers for constructing and hashing chunk payloads.

use crate::qdrant::types::ChunkPoint;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(point: &ChunkPoint, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("text".into(), Value::String(point.text.clone()));
    payload.insert("source".into(), Value::String(point.source.clone()));
    payload.insert("chunk_index".into(), json!(point.chunk_index));
    payload.insert("title".into(), Value::String(point.source.clone()));
    payload.insert("chunk_label".into(), Value::String(point.label.clone()));
    payload.insert("chunk_hash".into(), Value::String(point.chunk_hash.clone()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Construct a unique identifier for a chunk point.
pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}
