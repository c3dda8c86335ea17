//! Document/Chunk rows for the structured corpus store. Mirrors the
//! attribute lists in the shared data model: a document owns its chunks and
//! is replaced atomically (delete-then-reinsert) on every sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_BODY_TEXT_BYTES: usize = 20 * 1024;

/// One logical record pulled from a source connector, ready for upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub doc_id: String,
    pub source: String,
    pub external_id: String,
    pub thread_id: Option<String>,
    pub account_id: Option<String>,
    pub title: Option<String>,
    pub body_text: String,
    pub author: Option<String>,
    pub participants: Vec<String>,
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub deep_link: Option<String>,
    pub metadata: serde_json::Value,
    pub checksum: String,
}

impl DocumentPayload {
    /// Strips null bytes and truncates to `MAX_BODY_TEXT_BYTES`, matching the
    /// storage-layer contract that every insertion sanitizes body text first.
    pub fn sanitized_body(&self) -> String {
        let stripped: String = self.body_text.chars().filter(|c| *c != '\0').collect();
        if stripped.len() <= MAX_BODY_TEXT_BYTES {
            return stripped;
        }
        let mut truncated = stripped;
        while truncated.len() > MAX_BODY_TEXT_BYTES {
            truncated.pop();
        }
        truncated
    }
}

/// A document row as persisted, with server-assigned timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub doc_id: String,
    pub source: String,
    pub external_id: String,
    pub thread_id: Option<String>,
    pub account_id: Option<String>,
    pub title: Option<String>,
    pub body_text: String,
    pub author: Option<String>,
    pub participants: serde_json::Value,
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub deep_link: Option<String>,
    pub metadata: serde_json::Value,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A retrievable text fragment of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub source: String,
    pub chunk_index: i32,
    pub text: String,
    pub token_count: i32,
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn deterministic_id(doc_id: &str, index: usize) -> String {
        format!("{doc_id}:{index}")
    }

    /// Portable form for the fallback path / native-column backfill.
    pub fn embedding_serialized(&self) -> String {
        serde_json::to_string(&self.embedding).unwrap_or_default()
    }
}

/// A chunk row joined with enough document metadata to render a citation.
/// `embedding_serialized` carries the portable vector form so the in-process
/// fallback scorer can compute cosine similarity without a native vector
/// column round trip.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChunkRow {
    pub chunk_id: String,
    pub doc_id: String,
    pub source: String,
    pub chunk_index: i32,
    pub text: String,
    pub token_count: i32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub deep_link: Option<String>,
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub embedding_serialized: Option<String>,
}

/// Parses the portable JSON-array form of an embedding back into a vector.
/// Returns `None` on missing/empty/malformed input, matching the reference
/// implementation's defensive `_parse_embedding`.
pub fn parse_embedding_serialized(raw: Option<&str>) -> Option<Vec<f32>> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str::<Vec<f32>>(raw).ok()
}
