//! Postgres-backed structured store for documents and chunks: the primary
//! path for the hybrid retriever (HNSW cosine + `tsvector` full text) and
//! the schema the guardrail-validated executor runs ad-hoc SQL against.
//! Schema is created on first use; HNSW index creation is attempted once
//! and downgrades to the fallback (scoring done by the caller) on failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::model::{Chunk, ChunkRow, Document, DocumentPayload};

pub struct CorpusStore {
    pool: PgPool,
    has_vector_index: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct ChunkFilters {
    pub sources: Vec<String>,
    pub time_from: Option<DateTime<Utc>>,
    pub time_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: ChunkRow,
    pub score: f64,
}

impl CorpusStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self {
            pool,
            has_vector_index: AtomicBool::new(true),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wraps an already-connected pool (an ephemeral `sqlx::test` database,
    /// typically) and runs the same schema bootstrap `connect` does.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn from_pool(pool: PgPool) -> Result<Self, sqlx::Error> {
        let store = Self {
            pool,
            has_vector_index: AtomicBool::new(true),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn has_vector_index(&self) -> bool {
        self.has_vector_index.load(Ordering::Relaxed)
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                external_id TEXT NOT NULL,
                thread_id TEXT,
                account_id TEXT,
                title TEXT,
                body_text TEXT NOT NULL,
                author TEXT,
                participants JSONB NOT NULL DEFAULT '[]',
                timestamp_utc TIMESTAMPTZ,
                deep_link TEXT,
                metadata JSONB NOT NULL DEFAULT '{}',
                checksum TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
                source TEXT NOT NULL,
                chunk_index INT NOT NULL,
                text TEXT NOT NULL,
                token_count INT NOT NULL,
                embedding vector(384),
                embedding_serialized TEXT,
                search_vector tsvector GENERATED ALWAYS AS (to_tsvector('english', text)) STORED,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS chunks_search_idx ON chunks USING GIN (search_vector)")
            .execute(&self.pool)
            .await?;

        let hnsw = sqlx::query(
            "CREATE INDEX IF NOT EXISTS chunks_embedding_idx ON chunks USING hnsw (embedding vector_cosine_ops)",
        )
        .execute(&self.pool)
        .await;
        if hnsw.is_err() {
            self.has_vector_index.store(false, Ordering::Relaxed);
            tracing::warn!("vector index creation failed, falling back to lexical-only scoring");
        }

        Ok(())
    }

    /// Atomic single-document upsert: replaces metadata and all chunks.
    pub async fn upsert_document(
        &self,
        payload: &DocumentPayload,
        chunk_texts: &[String],
        chunk_vectors: &[Vec<f32>],
    ) -> Result<(usize, usize), sqlx::Error> {
        let (created, chunks) = self
            .bulk_upsert_documents(std::slice::from_ref(&(
                payload.clone(),
                chunk_texts.to_vec(),
                chunk_vectors.to_vec(),
            )))
            .await?;
        Ok((created, chunks))
    }

    /// Same semantics for many documents in one transaction. Deduplicates by
    /// `doc_id`, keeping the last occurrence in `items`.
    pub async fn bulk_upsert_documents(
        &self,
        items: &[(DocumentPayload, Vec<String>, Vec<Vec<f32>>)],
    ) -> Result<(usize, usize), sqlx::Error> {
        let mut by_doc_id: HashMap<String, &(DocumentPayload, Vec<String>, Vec<Vec<f32>>)> =
            HashMap::new();
        for item in items {
            by_doc_id.insert(item.0.doc_id.clone(), item);
        }
        let deduped: Vec<_> = by_doc_id.into_values().collect();

        let mut tx = self.pool.begin().await?;

        let doc_ids: Vec<String> = deduped.iter().map(|(p, _, _)| p.doc_id.clone()).collect();
        let existing: Vec<String> = sqlx::query_scalar("SELECT doc_id FROM documents WHERE doc_id = ANY($1)")
            .bind(&doc_ids)
            .fetch_all(&mut *tx)
            .await?;
        let existing: std::collections::HashSet<String> = existing.into_iter().collect();

        let mut docs_created = 0usize;
        let mut chunks_created = 0usize;

        for (payload, chunk_texts, chunk_vectors) in &deduped {
            let body = payload.sanitized_body();
            let is_new = !existing.contains(&payload.doc_id);
            if is_new {
                docs_created += 1;
            }

            sqlx::query(
                r"
                INSERT INTO documents
                    (doc_id, source, external_id, thread_id, account_id, title, body_text,
                     author, participants, timestamp_utc, deep_link, metadata, checksum, updated_at)
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13, now())
                ON CONFLICT (doc_id) DO UPDATE SET
                    source = EXCLUDED.source,
                    external_id = EXCLUDED.external_id,
                    thread_id = EXCLUDED.thread_id,
                    account_id = EXCLUDED.account_id,
                    title = EXCLUDED.title,
                    body_text = EXCLUDED.body_text,
                    author = EXCLUDED.author,
                    participants = EXCLUDED.participants,
                    timestamp_utc = EXCLUDED.timestamp_utc,
                    deep_link = EXCLUDED.deep_link,
                    metadata = EXCLUDED.metadata,
                    checksum = EXCLUDED.checksum,
                    updated_at = now()
                ",
            )
            .bind(&payload.doc_id)
            .bind(&payload.source)
            .bind(&payload.external_id)
            .bind(&payload.thread_id)
            .bind(&payload.account_id)
            .bind(&payload.title)
            .bind(&body)
            .bind(&payload.author)
            .bind(serde_json::to_value(&payload.participants).unwrap_or(serde_json::Value::Null))
            .bind(payload.timestamp_utc)
            .bind(&payload.deep_link)
            .bind(&payload.metadata)
            .bind(&payload.checksum)
            .execute(&mut *tx)
            .await?;

            if !is_new {
                sqlx::query("DELETE FROM chunks WHERE doc_id = $1")
                    .bind(&payload.doc_id)
                    .execute(&mut *tx)
                    .await?;
            }

            let chunks: Vec<Chunk> = chunk_texts
                .iter()
                .enumerate()
                .map(|(index, text)| Chunk {
                    chunk_id: Chunk::deterministic_id(&payload.doc_id, index),
                    doc_id: payload.doc_id.clone(),
                    source: payload.source.clone(),
                    chunk_index: i32::try_from(index).unwrap_or(i32::MAX),
                    text: text.clone(),
                    token_count: u32::try_from(text.split_whitespace().count())
                        .map(|v| i32::try_from(v).unwrap_or(i32::MAX))
                        .unwrap_or(i32::MAX),
                    embedding: chunk_vectors.get(index).cloned().unwrap_or_default(),
                })
                .collect();

            for batch in chunks.chunks(1000) {
                for chunk in batch {
                    sqlx::query(
                        r"
                        INSERT INTO chunks (chunk_id, doc_id, source, chunk_index, text, token_count, embedding_serialized)
                        VALUES ($1,$2,$3,$4,$5,$6,$7)
                        ON CONFLICT (chunk_id) DO NOTHING
                        ",
                    )
                    .bind(&chunk.chunk_id)
                    .bind(&chunk.doc_id)
                    .bind(&chunk.source)
                    .bind(chunk.chunk_index)
                    .bind(&chunk.text)
                    .bind(chunk.token_count)
                    .bind(chunk.embedding_serialized())
                    .execute(&mut *tx)
                    .await?;
                    chunks_created += 1;
                }
            }

            if self.has_vector_index.load(Ordering::Relaxed) {
                for batch in chunks.chunks(500) {
                    for chunk in batch {
                        if chunk.embedding.is_empty() {
                            continue;
                        }
                        let vector = pgvector::Vector::from(chunk.embedding.clone());
                        sqlx::query("UPDATE chunks SET embedding = $1 WHERE chunk_id = $2")
                            .bind(vector)
                            .bind(&chunk.chunk_id)
                            .execute(&mut *tx)
                            .await?;
                    }
                }
            }
        }

        tx.commit().await?;
        Ok((docs_created, chunks_created))
    }

    /// Chunks joined with document metadata, ordered by document timestamp
    /// descending (nulls last) then chunk index ascending.
    pub async fn list_chunks(
        &self,
        filters: &ChunkFilters,
        limit: i64,
    ) -> Result<Vec<ChunkRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            r"
            SELECT c.chunk_id, c.doc_id, c.source, c.chunk_index, c.text, c.token_count,
                   d.title, d.author, d.deep_link, d.timestamp_utc, c.embedding_serialized
            FROM chunks c
            JOIN documents d ON d.doc_id = c.doc_id
            WHERE ($1::text[] IS NULL OR c.source = ANY($1))
              AND ($2::timestamptz IS NULL OR d.timestamp_utc >= $2)
              AND ($3::timestamptz IS NULL OR d.timestamp_utc <= $3)
            ORDER BY d.timestamp_utc DESC NULLS LAST, c.chunk_index ASC
            LIMIT $4
            ",
        )
        .bind(if filters.sources.is_empty() {
            None
        } else {
            Some(&filters.sources)
        })
        .bind(filters.time_from)
        .bind(filters.time_to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Fused dense+lexical search: `0.6*(1/(1+cos_dist)) + 0.4*ts_rank`,
    /// clamped to `[0,1]`. Falls back to lexical-only when no vector index.
    pub async fn vector_search(
        &self,
        query_vector: &[f32],
        query_text: &str,
        filters: &ChunkFilters,
        top_k: i64,
    ) -> Result<Vec<ScoredChunk>, sqlx::Error> {
        if !self.has_vector_index.load(Ordering::Relaxed) || query_vector.is_empty() {
            return self.lexical_search(query_text, filters, top_k).await;
        }

        let vector = pgvector::Vector::from(query_vector.to_vec());
        let rows = sqlx::query(
            r"
            SELECT c.chunk_id, c.doc_id, c.source, c.chunk_index, c.text, c.token_count,
                   d.title, d.author, d.deep_link, d.timestamp_utc, c.embedding_serialized,
                   (0.6 * (1.0 / (1.0 + (c.embedding <=> $1)))
                    + 0.4 * ts_rank(c.search_vector, plainto_tsquery('english', $2))) AS fused_score
            FROM chunks c
            JOIN documents d ON d.doc_id = c.doc_id
            WHERE c.embedding IS NOT NULL
              AND ($3::text[] IS NULL OR c.source = ANY($3))
              AND ($4::timestamptz IS NULL OR d.timestamp_utc >= $4)
              AND ($5::timestamptz IS NULL OR d.timestamp_utc <= $5)
            ORDER BY fused_score DESC
            LIMIT $6
            ",
        )
        .bind(vector)
        .bind(query_text)
        .bind(if filters.sources.is_empty() {
            None
        } else {
            Some(&filters.sources)
        })
        .bind(filters.time_from)
        .bind(filters.time_to)
        .bind(top_k)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let score: f64 = row.try_get("fused_score").unwrap_or(0.0);
                ScoredChunk {
                    chunk: ChunkRow {
                        chunk_id: row.get("chunk_id"),
                        doc_id: row.get("doc_id"),
                        source: row.get("source"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        token_count: row.get("token_count"),
                        title: row.get("title"),
                        author: row.get("author"),
                        deep_link: row.get("deep_link"),
                        timestamp_utc: row.get("timestamp_utc"),
                        embedding_serialized: row.get("embedding_serialized"),
                    },
                    score: score.clamp(0.0, 1.0),
                }
            })
            .collect())
    }

    async fn lexical_search(
        &self,
        query_text: &str,
        filters: &ChunkFilters,
        top_k: i64,
    ) -> Result<Vec<ScoredChunk>, sqlx::Error> {
        let rows = sqlx::query(
            r"
            SELECT c.chunk_id, c.doc_id, c.source, c.chunk_index, c.text, c.token_count,
                   d.title, d.author, d.deep_link, d.timestamp_utc, c.embedding_serialized,
                   ts_rank(c.search_vector, plainto_tsquery('english', $1)) AS rank
            FROM chunks c
            JOIN documents d ON d.doc_id = c.doc_id
            WHERE ($2::text[] IS NULL OR c.source = ANY($2))
              AND ($3::timestamptz IS NULL OR d.timestamp_utc >= $3)
              AND ($4::timestamptz IS NULL OR d.timestamp_utc <= $4)
            ORDER BY rank DESC
            LIMIT $5
            ",
        )
        .bind(query_text)
        .bind(if filters.sources.is_empty() {
            None
        } else {
            Some(&filters.sources)
        })
        .bind(filters.time_from)
        .bind(filters.time_to)
        .bind(top_k)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let rank: f64 = row.try_get("rank").unwrap_or(0.0);
                ScoredChunk {
                    chunk: ChunkRow {
                        chunk_id: row.get("chunk_id"),
                        doc_id: row.get("doc_id"),
                        source: row.get("source"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        token_count: row.get("token_count"),
                        title: row.get("title"),
                        author: row.get("author"),
                        deep_link: row.get("deep_link"),
                        timestamp_utc: row.get("timestamp_utc"),
                        embedding_serialized: row.get("embedding_serialized"),
                    },
                    score: rank.clamp(0.0, 1.0),
                }
            })
            .collect())
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Option<Document>, sqlx::Error> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE doc_id = $1")
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
