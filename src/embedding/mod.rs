use crate::config::{EmbeddingProvider, get_config};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// HTTP layer failed while talking to the provider.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Produce one embedding vector per supplied text, in order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Deterministic byte-folding embedder requiring no external service.
///
/// Content bytes are folded into vector slots and the result is normalized to unit
/// length. Identical inputs always map to identical vectors, which keeps retrieval
/// reproducible in tests and in environments without an embedding runtime.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Construct an embedder producing vectors of the given dimension.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        if text.is_empty() {
            return vector;
        }

        for (position, byte) in text.bytes().enumerate() {
            let slot = (position + usize::from(byte)) % self.dimension;
            vector[slot] += f32::from(byte) / 255.0;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if texts.is_empty() {
            return Err(EmbeddingError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }
}

/// Embedding client backed by a local Ollama runtime.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Construct a client against the given Ollama base URL.
    pub fn new(base_url: String, model: String) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .user_agent("fournil/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());

        for text in texts {
            let response = self
                .client
                .post(&url)
                .json(&serde_json::json!({
                    "model": self.model,
                    "prompt": text,
                }))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::GenerationFailed(format!(
                    "Ollama returned {status}: {body}"
                )));
            }

            let payload: OllamaEmbeddingResponse = response.json().await?;
            vectors.push(payload.embedding);
        }

        Ok(vectors)
    }
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedder() -> Result<Box<dyn Embedder>, EmbeddingError> {
    let config = get_config();
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Selecting embedding client"
    );

    match config.embedding_provider {
        EmbeddingProvider::Hash => Ok(Box::new(HashEmbedder::new(config.embedding_dimension))),
        EmbeddingProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string());
            Ok(Box::new(OllamaEmbedder::new(
                base_url,
                config.embedding_model.clone(),
            )?))
        }
    }
}
