//! Ingestion Coordinator: one pass per sync. Chunks and embeds everything
//! in bulk before touching storage, so a single transaction commits or the
//! source's cursor does not advance at all.

use std::sync::Arc;

use chrono::Utc;
use common::error::AppError;
use common::oracle::EmbeddingOracle;
use common::storage::db::SurrealDbClient;
use common::storage::types::source_state::SourceState;
use corpus_store::{CorpusStore, DocumentPayload};
use tracing::{info, instrument, warn};

use crate::chunker;
use crate::connectors::SourceConnector;
use crate::pipeline::state::ready;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncReport {
    pub source: String,
    pub documents_created: usize,
    pub chunks_created: usize,
    pub message: String,
}

pub struct IngestionCoordinator {
    corpus: Arc<CorpusStore>,
    bookkeeping: Arc<SurrealDbClient>,
    embedder: Arc<dyn EmbeddingOracle>,
}

impl IngestionCoordinator {
    pub fn new(
        corpus: Arc<CorpusStore>,
        bookkeeping: Arc<SurrealDbClient>,
        embedder: Arc<dyn EmbeddingOracle>,
    ) -> Self {
        Self {
            corpus,
            bookkeeping,
            embedder,
        }
    }

    #[instrument(level = "info", skip_all, fields(source = connector.source(), full))]
    pub async fn run_sync(
        &self,
        connector: &mut dyn SourceConnector,
        full: bool,
    ) -> Result<SyncReport, AppError> {
        let source = connector.source();
        let machine = ready();

        let existing_state = self.bookkeeping.get_item::<SourceState>(source).await?;
        let cursor = existing_state.as_ref().map(|s| s.cursor.clone());

        let collected = connector.collect(cursor, full).await?;

        let mut per_doc_chunks: Vec<Vec<String>> = Vec::with_capacity(collected.documents.len());
        let mut flat_texts: Vec<String> = Vec::new();
        for payload in &collected.documents {
            let body = payload.sanitized_body();
            let chunks = chunker::chunk(&body);
            flat_texts.extend(chunks.iter().cloned());
            per_doc_chunks.push(chunks);
        }
        let machine = machine
            .chunk()
            .map_err(|(_, guard)| abort_error("chunk", &guard))?;

        let vectors = if flat_texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.encode_batch(&flat_texts).await?
        };
        let machine = machine
            .embed()
            .map_err(|(_, guard)| abort_error("embed", &guard))?;

        let mut offset = 0usize;
        let mut items: Vec<(DocumentPayload, Vec<String>, Vec<Vec<f32>>)> =
            Vec::with_capacity(collected.documents.len());
        for (payload, chunks) in collected.documents.iter().zip(per_doc_chunks.into_iter()) {
            let count = chunks.len();
            let doc_vectors = vectors
                .get(offset..offset + count)
                .map(<[Vec<f32>]>::to_vec)
                .unwrap_or_default();
            offset += count;
            items.push((payload.clone(), chunks, doc_vectors));
        }

        let (docs_created, chunks_created) = match self.corpus.bulk_upsert_documents(&items).await {
            Ok(result) => result,
            Err(err) => {
                let _ = machine.abort();
                return Err(AppError::from(err));
            }
        };
        let _machine = machine
            .persist()
            .map_err(|(_, guard)| abort_error("persist", &guard))?;

        self.merge_cursor(source, existing_state, collected.cursor).await?;

        info!(source, docs_created, chunks_created, "ingestion sync completed");
        Ok(SyncReport {
            source: source.to_string(),
            documents_created: docs_created,
            chunks_created,
            message: collected.message,
        })
    }

    async fn merge_cursor(
        &self,
        source: &str,
        existing: Option<SourceState>,
        new_cursor: serde_json::Value,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut merged = existing
            .as_ref()
            .map(|s| s.cursor.clone())
            .unwrap_or_else(|| serde_json::json!({}));
        if let (Some(merged_obj), Some(new_obj)) = (merged.as_object_mut(), new_cursor.as_object()) {
            for (key, value) in new_obj {
                merged_obj.insert(key.clone(), value.clone());
            }
        } else {
            merged = new_cursor;
        }

        let state = SourceState {
            id: source.to_string(),
            created_at: existing.as_ref().map_or(now, |s| s.created_at),
            updated_at: now,
            source: source.to_string(),
            connected: true,
            last_sync_at: Some(now),
            cursor: merged,
        };

        if existing.is_some() {
            self.bookkeeping.update_item(source, state).await?;
        } else {
            self.bookkeeping.store_item(state).await?;
        }
        Ok(())
    }
}

fn abort_error(event: &str, guard: &state_machines::core::GuardError) -> AppError {
    warn!(event, ?guard, "ingestion pipeline transition rejected");
    AppError::Processing(format!("invalid ingestion transition during {event}: {guard:?}"))
}
