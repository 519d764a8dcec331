//! Retrieval service coordinating chunking, embedding, and Qdrant operations.

use crate::{
    config::get_config,
    embedding::{Embedder, get_embedder},
    metrics::AssistantMetrics,
    qdrant::{ChunkPoint, QdrantService, RetrievedChunk, compute_chunk_hash},
    retrieval::{
        chunking::chunk_document,
        types::{
            Document, IngestError, IngestOutcome, IngestSummary, RetrievedContext, SearchError,
        },
    },
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Tunables governing chunking and search, normally taken from configuration.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Target Qdrant collection.
    pub collection: String,
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Overlap carried between consecutive chunks, in characters.
    pub chunk_overlap: usize,
    /// Number of candidates retrieved per query.
    pub top_k: usize,
    /// Maximum cosine distance accepted by the relevance gate.
    pub max_distance: f32,
    /// Expected embedding dimension.
    pub dimension: usize,
}

impl RetrievalOptions {
    /// Build options from the loaded configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            collection: config.qdrant_collection_name.clone(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.retrieval_top_k,
            max_distance: config.relevance_max_distance,
            dimension: config.embedding_dimension,
        }
    }
}

/// Coordinates the full retrieval pipeline: chunking, embedding, and Qdrant access.
///
/// The service owns long-lived handles to the embedding client and the Qdrant
/// transport so the interactive loop and the HTTP surface share the same components.
/// Construct it once near process start and share it through an `Arc`.
pub struct RetrievalService {
    embedder: Box<dyn Embedder>,
    qdrant: QdrantService,
    options: RetrievalOptions,
    metrics: Arc<AssistantMetrics>,
}

impl RetrievalService {
    /// Build a new retrieval service from the loaded configuration.
    pub fn new(metrics: Arc<AssistantMetrics>) -> Result<Self, IngestError> {
        let embedder = get_embedder()?;
        let qdrant = QdrantService::new()?;
        Ok(Self::from_parts(
            embedder,
            qdrant,
            RetrievalOptions::from_config(),
            metrics,
        ))
    }

    /// Assemble a service from explicit components.
    pub fn from_parts(
        embedder: Box<dyn Embedder>,
        qdrant: QdrantService,
        options: RetrievalOptions,
        metrics: Arc<AssistantMetrics>,
    ) -> Self {
        Self {
            embedder,
            qdrant,
            options,
            metrics,
        }
    }

    /// Drop any stale points and start from an empty collection.
    ///
    /// The corpus is rebuilt from the document directory on every process start.
    pub async fn reset_index(&self) -> Result<(), IngestError> {
        self.qdrant
            .reset_collection(&self.options.collection, self.options.dimension as u64)
            .await?;
        tracing::info!(collection = %self.options.collection, "Collection reset");
        Ok(())
    }

    /// Ingest every document in `documents`, dropping the ones that fail.
    ///
    /// Failures are logged per document and do not abort the pass; the index simply
    /// ends up partial.
    pub async fn ingest_documents(&self, documents: &[Document]) -> IngestSummary {
        let mut summary = IngestSummary::default();

        for document in documents {
            match self.ingest_document(document).await {
                Ok(outcome) => {
                    summary.documents += 1;
                    summary.chunks += outcome.chunk_count;
                }
                Err(error) => {
                    tracing::error!(
                        title = %document.title,
                        error = %error,
                        "Failed to ingest document; dropping it"
                    );
                    summary.failures += 1;
                }
            }
        }

        tracing::info!(
            documents = summary.documents,
            chunks = summary.chunks,
            failures = summary.failures,
            "Ingestion pass complete"
        );
        summary
    }

    /// Chunk, embed, and index a single document.
    pub async fn ingest_document(&self, document: &Document) -> Result<IngestOutcome, IngestError> {
        tracing::info!(title = %document.title, "Processing document");

        let chunks = chunk_document(
            &document.text,
            &document.title,
            self.options.chunk_size,
            self.options.chunk_overlap,
        )?;

        // Within-document dedupe by content hash, first occurrence wins.
        let mut seen = HashSet::new();
        let mut skipped_duplicates = 0usize;
        let mut kept = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let hash = compute_chunk_hash(&chunk.text);
            if seen.insert(hash.clone()) {
                kept.push((chunk, hash));
            } else {
                skipped_duplicates += 1;
            }
        }

        if kept.is_empty() {
            tracing::debug!(title = %document.title, "Document produced no chunks");
            return Ok(IngestOutcome {
                chunk_count: 0,
                skipped_duplicates,
            });
        }

        let texts: Vec<String> = kept.iter().map(|(chunk, _)| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;
        debug_assert_eq!(kept.len(), embeddings.len());

        let points: Vec<ChunkPoint> = kept
            .into_iter()
            .zip(embeddings)
            .map(|((chunk, chunk_hash), vector)| ChunkPoint {
                text: chunk.text,
                vector,
                source: chunk.title,
                chunk_index: chunk.index,
                label: chunk.label,
                chunk_hash,
            })
            .collect();

        let chunk_count = self
            .qdrant
            .upsert_chunks(&self.options.collection, points)
            .await?;

        self.metrics.record_document(chunk_count as u64);
        tracing::info!(
            title = %document.title,
            chunks = chunk_count,
            skipped_duplicates,
            "Document indexed"
        );

        Ok(IngestOutcome {
            chunk_count,
            skipped_duplicates,
        })
    }

    /// Retrieve the chunks most relevant to `query`, inside the relevance gate.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, SearchError> {
        let mut vectors = self.embedder.embed(vec![query.to_string()]).await?;
        let vector = vectors.pop().ok_or(SearchError::EmptyEmbedding)?;

        let expected = self.options.dimension;
        let actual = vector.len();
        if actual != expected {
            return Err(SearchError::DimensionMismatch { expected, actual });
        }

        let hits = self
            .qdrant
            .search_chunks(
                &self.options.collection,
                vector,
                self.options.top_k,
                self.options.max_distance,
            )
            .await?;

        tracing::debug!(query, hits = hits.len(), "Retrieval complete");
        Ok(hits)
    }

    /// Retrieve and concatenate context for a question as a tagged outcome.
    pub async fn retrieve_context(&self, query: &str) -> Result<RetrievedContext, SearchError> {
        let hits = self.retrieve(query).await?;
        Ok(build_context(&hits))
    }
}

/// Join retrieved chunk texts into a tagged context value.
pub fn build_context(hits: &[RetrievedChunk]) -> RetrievedContext {
    if hits.is_empty() {
        return RetrievedContext::NotFound;
    }
    let joined = hits
        .iter()
        .map(|hit| hit.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    RetrievedContext::Found(joined)
}

/// Load every `.txt` file under `dir` as a document titled by its file name.
///
/// Unreadable files are logged and skipped; a missing directory yields an empty
/// corpus rather than an error.
pub fn load_documents(dir: &Path) -> Vec<Document> {
    let mut documents = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(error = %error, "Skipping unreadable directory entry");
                None
            }
        })
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("txt")
        {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => {
                let title = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("untitled")
                    .to_string();
                tracing::info!(title = %title, "Loaded document");
                documents.push(Document { title, text });
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "Failed to read document; skipping");
            }
        }
    }

    if documents.is_empty() {
        tracing::warn!(dir = %dir.display(), "No documents loaded");
    }
    documents
}
