//! In-memory similarity index over embedded corpus chunks.
//!
//! The index is filled once, on first use or through an explicit
//! [`SimilarityIndex::initialize`] call at startup. Initialization is
//! single-flight: concurrent callers await the same ingestion run, and a
//! failed run leaves the index uninitialized so a later call can retry.
//! A run builds its chunks off to the side and commits them in one step, so
//! a run that is dropped part way (a cancelled first query) adds nothing.
//!
//! Queries are a brute-force cosine scan over every stored chunk.

use anyhow::Result;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;

use context_agent_core::chunk::{chunk_text, is_substantial};
use context_agent_core::models::{Chunk, IndexStats, RetrievedChunk};
use context_agent_core::similarity::top_k;

use crate::config::{ChunkingConfig, Config};
use crate::corpus::DocumentSource;
use crate::embedding::EmbeddingProvider;

/// Per-source chunk counts from a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPreview {
    pub source: String,
    /// Chunks produced by the chunker.
    pub chunks: usize,
    /// Chunks long enough to be embedded.
    pub kept: usize,
}

pub struct SimilarityIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    corpus: Arc<dyn DocumentSource>,
    chunking: ChunkingConfig,
    throttle: Duration,
    chunks: RwLock<Vec<Arc<Chunk>>>,
    initialized: OnceCell<()>,
}

impl SimilarityIndex {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn DocumentSource>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            corpus,
            chunking,
            throttle: Duration::ZERO,
            chunks: RwLock::new(Vec::new()),
            initialized: OnceCell::new(),
        }
    }

    /// Build an index using the chunking and throttle settings from `config`.
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn DocumentSource>,
    ) -> Self {
        Self::new(embedder, corpus, config.chunking.clone())
            .with_throttle(Duration::from_millis(config.embedding.throttle_ms))
    }

    /// Pause between consecutive embedding calls during ingestion.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Load and ingest the corpus, once.
    ///
    /// Later calls return immediately with the current stats.
    pub async fn initialize(&self) -> Result<IndexStats> {
        self.initialized
            .get_or_try_init(|| self.ingest_corpus())
            .await?;
        Ok(self.stats())
    }

    async fn ingest_corpus(&self) -> Result<()> {
        let documents = self.corpus.load().await?;

        if !self.embedder.is_enabled() {
            tracing::warn!(
                documents = documents.len(),
                "embedding provider is disabled; index will stay empty"
            );
            return Ok(());
        }

        tracing::info!(
            documents = documents.len(),
            model = self.embedder.model_name(),
            "ingesting corpus"
        );

        let mut pending = Vec::new();
        for doc in &documents {
            let embedded = self.embed_document(&doc.text, &doc.source).await;
            tracing::info!(source = %doc.source, chunks = embedded.len(), "ingested document");
            pending.extend(embedded);
        }

        let total_chunks = {
            let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
            chunks.extend(pending);
            chunks.len()
        };
        tracing::info!(total_chunks, "corpus ingestion complete");
        Ok(())
    }

    /// Chunk, embed, and append one document. Returns the number of chunks
    /// appended.
    ///
    /// Chunks shorter than `min_chunk_chars` are dropped before embedding. A
    /// chunk whose embedding fails is logged and skipped; the rest of the
    /// document still goes in.
    pub async fn ingest(&self, text: &str, source: &str) -> usize {
        let embedded = self.embed_document(text, source).await;
        let added = embedded.len();
        self.chunks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(embedded);
        added
    }

    async fn embed_document(&self, text: &str, source: &str) -> Vec<Arc<Chunk>> {
        let mut embedded = Vec::new();
        let mut first_call = true;

        for (chunk_index, content) in chunk_text(text, self.chunking.target_chars)
            .into_iter()
            .enumerate()
        {
            if !is_substantial(&content, self.chunking.min_chunk_chars) {
                continue;
            }

            if !first_call && !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
            first_call = false;

            let embedding = match self.embedder.embed(&content).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        source = %source,
                        chunk_index,
                        error = %e,
                        "failed to embed chunk, skipping"
                    );
                    continue;
                }
            };

            let chunk = Chunk {
                id: Chunk::make_id(source, chunk_index),
                content,
                embedding,
                source: source.to_string(),
                chunk_index,
            };
            embedded.push(Arc::new(chunk));
        }

        embedded
    }

    /// Return the `k` chunks most similar to `text`, best first.
    ///
    /// Triggers initialization on first use. An empty index returns an empty
    /// result without calling the embedding provider.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.initialize().await?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(text).await?;

        let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        let ranked = top_k(
            &query_vec,
            chunks.iter().map(|c| c.embedding.as_slice()),
            k,
        );

        Ok(ranked
            .into_iter()
            .map(|(i, similarity)| RetrievedChunk {
                chunk: Arc::clone(&chunks[i]),
                similarity,
            })
            .collect())
    }

    pub fn stats(&self) -> IndexStats {
        let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        let mut sources: Vec<String> = Vec::new();
        for chunk in chunks.iter() {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }
        IndexStats {
            total_chunks: chunks.len(),
            sources,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunk the corpus without embedding anything.
    pub async fn preview(&self) -> Result<Vec<ChunkPreview>> {
        let documents = self.corpus.load().await?;
        Ok(documents
            .iter()
            .map(|doc| {
                let chunks = chunk_text(&doc.text, self.chunking.target_chars);
                let kept = chunks
                    .iter()
                    .filter(|c| is_substantial(c, self.chunking.min_chunk_chars))
                    .count();
                ChunkPreview {
                    source: doc.source.clone(),
                    chunks: chunks.len(),
                    kept,
                }
            })
            .collect())
    }
}
