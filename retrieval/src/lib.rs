//! Hybrid retriever (C6): ranked chunk lookup combining dense similarity and
//! lexical rank, with source/time filters. Delegates to the corpus store's
//! fused HNSW+tsvector query when a vector index exists; otherwise runs the
//! in-process lexical+vector+recency scorer over `list_chunks` candidates,
//! matching the reference retriever's behavior when no index is available.

pub mod scoring;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::error::AppError;
use common::oracle::EmbeddingOracle;
use common::text::tokenize;
use corpus_store::{parse_embedding_serialized, ChunkFilters, ChunkRow, CorpusStore};
use scoring::{score_candidate, FallbackCandidate};
use tracing::instrument;

/// Maximum fallback candidate pool considered per retrieval, mirroring the
/// reference implementation's `max(200, top_k * 20)`.
const MIN_FALLBACK_CANDIDATES: i64 = 200;
const FALLBACK_CANDIDATES_PER_RESULT: i64 = 20;

#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    pub sources: Vec<String>,
    pub time_from: Option<DateTime<Utc>>,
    pub time_to: Option<DateTime<Utc>>,
}

impl From<RetrievalFilters> for ChunkFilters {
    fn from(value: RetrievalFilters) -> Self {
        ChunkFilters {
            sources: value.sources,
            time_from: value.time_from,
            time_to: value.time_to,
        }
    }
}

/// A ranked chunk returned to the ask orchestrator, already bounded to
/// `[0, 1]`.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub source: String,
    pub text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub deep_link: Option<String>,
    pub score: f64,
}

pub struct HybridRetriever {
    corpus: std::sync::Arc<CorpusStore>,
    embedder: std::sync::Arc<dyn EmbeddingOracle>,
}

impl HybridRetriever {
    pub fn new(
        corpus: std::sync::Arc<CorpusStore>,
        embedder: std::sync::Arc<dyn EmbeddingOracle>,
    ) -> Self {
        Self { corpus, embedder }
    }

    #[instrument(level = "info", skip_all, fields(top_k))]
    pub async fn retrieve(
        &self,
        question: &str,
        filters: RetrievalFilters,
        top_k: i64,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        let question_tokens = tokenize(question);
        if question_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let question_vector = self.embedder.encode(question).await?;

        if self.corpus.has_vector_index() {
            let filters: ChunkFilters = filters.into();
            let scored = self
                .corpus
                .vector_search(&question_vector, question, &filters, top_k)
                .await
                .map_err(AppError::from)?;
            return Ok(scored
                .into_iter()
                .map(|s| RetrievedChunk {
                    chunk_id: s.chunk.chunk_id,
                    doc_id: s.chunk.doc_id,
                    source: s.chunk.source,
                    text: s.chunk.text,
                    title: s.chunk.title,
                    author: s.chunk.author,
                    timestamp_utc: s.chunk.timestamp_utc,
                    deep_link: s.chunk.deep_link,
                    score: s.score,
                })
                .collect());
        }

        self.retrieve_fallback(&question_tokens, &question_vector, filters, top_k)
            .await
    }

    async fn retrieve_fallback(
        &self,
        question_tokens: &HashSet<String>,
        question_vector: &[f32],
        filters: RetrievalFilters,
        top_k: i64,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        let pool_limit = (top_k * FALLBACK_CANDIDATES_PER_RESULT).max(MIN_FALLBACK_CANDIDATES);
        let filters: ChunkFilters = filters.into();
        let candidates: Vec<ChunkRow> = self
            .corpus
            .list_chunks(&filters, pool_limit)
            .await
            .map_err(AppError::from)?;

        let mut scored: Vec<RetrievedChunk> = candidates
            .into_iter()
            .filter_map(|row| {
                let embedding = parse_embedding_serialized(row.embedding_serialized.as_deref());
                let candidate = FallbackCandidate { row, embedding };
                let score = score_candidate(question_tokens, question_vector, &candidate)?;
                Some(RetrievedChunk {
                    chunk_id: candidate.row.chunk_id,
                    doc_id: candidate.row.doc_id,
                    source: candidate.row.source,
                    text: candidate.row.text,
                    title: candidate.row.title,
                    author: candidate.row.author,
                    timestamp_utc: candidate.row.timestamp_utc,
                    deep_link: candidate.row.deep_link,
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k.max(0) as usize);
        Ok(scored)
    }
}
