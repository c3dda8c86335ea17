//! Local-message-db connector: read-only attach to a local chat database,
//! rowid-based cursor, typed-stream blob decoding for attributed-body
//! columns that store rich text instead of plain text.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::error::AppError;
use corpus_store::DocumentPayload;
use regex::bytes::Regex as BytesRegex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use std::env;
use std::sync::LazyLock;

use super::{cursor_get_i64, CollectedSync, SourceConnector};

/// Epoch for the local message store's integer timestamp column.
const STORE_EPOCH_OFFSET_SECS: i64 = 978_307_200; // 2001-01-01T00:00:00Z

static ATTRIBUTED_BODY_PATTERN: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"(?s)\x01\+.(.*?)\x86").expect("valid regex"));

pub struct LocalMessageDbConnector {
    db_path: String,
}

impl LocalMessageDbConnector {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self { db_path: db_path.into() }
    }
}

#[async_trait]
impl SourceConnector for LocalMessageDbConnector {
    fn source(&self) -> &'static str {
        "chat-b"
    }

    async fn connect(&mut self, _seed_cursor: Option<Value>) -> Result<(), AppError> {
        if !std::path::Path::new(&self.db_path).exists() {
            return Err(AppError::Validation(format!(
                "local message database not found at {}",
                self.db_path
            )));
        }
        Ok(())
    }

    async fn collect(&mut self, cursor: Option<Value>, full: bool) -> Result<CollectedSync, AppError> {
        let cursor = cursor.unwrap_or_else(|| json!({}));
        let last_rowid = if full { 0 } else { cursor_get_i64(&cursor, "last_rowid") };
        let limit: i64 = env::var("CHAT_B_SYNC_LIMIT").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(300);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&format!("file:{}?mode=ro", self.db_path))
            .await?;

        let rows = sqlx::query(
            r"
            SELECT
                m.ROWID AS rowid, m.guid, m.text, m.subject, m.attributedBody, m.date,
                m.is_from_me, m.service, h.id AS handle_id, c.chat_identifier, c.display_name
            FROM message m
            LEFT JOIN handle h ON h.ROWID = m.handle_id
            LEFT JOIN chat_message_join cmj ON cmj.message_id = m.ROWID
            LEFT JOIN chat c ON c.ROWID = cmj.chat_id
            WHERE m.ROWID > ?1
            ORDER BY m.ROWID ASC
            LIMIT ?2
            ",
        )
        .bind(last_rowid)
        .bind(limit)
        .fetch_all(&pool)
        .await?;

        let mut documents = Vec::new();
        let mut max_rowid = last_rowid;

        for row in rows {
            let rowid: i64 = row.try_get("rowid").unwrap_or(0);
            let guid: String = row.try_get("guid").unwrap_or_default();
            let guid = if guid.is_empty() { format!("msg-{rowid}") } else { guid };
            let text: String = row.try_get("text").unwrap_or_default();
            let subject: String = row.try_get("subject").unwrap_or_default();
            let attributed: Option<Vec<u8>> = row.try_get("attributedBody").ok();
            let raw_date: i64 = row.try_get("date").unwrap_or(0);
            let is_from_me: i64 = row.try_get("is_from_me").unwrap_or(0);
            let service: String = row.try_get("service").unwrap_or_else(|_| "local-chat".to_string());
            let handle_id: String = row.try_get("handle_id").unwrap_or_else(|_| "unknown".to_string());
            let chat_identifier: String = row.try_get("chat_identifier").unwrap_or_default();
            let display_name: String = row.try_get("display_name").unwrap_or_default();

            let mut body = if !text.trim().is_empty() {
                text.trim().to_string()
            } else if !subject.trim().is_empty() {
                subject.trim().to_string()
            } else {
                decode_attributed_body(attributed.as_deref())
            };
            if body.is_empty() {
                body = "Attachment-only message".to_string();
            }

            let timestamp = store_time_to_datetime(raw_date);
            let checksum = format!("{:x}", Sha256::digest(body.as_bytes()));

            documents.push(DocumentPayload {
                doc_id: format!("chat-b:{rowid}"),
                source: "chat-b".to_string(),
                external_id: guid.clone(),
                thread_id: if chat_identifier.is_empty() { None } else { Some(chat_identifier.clone()) },
                account_id: Some(service.clone()),
                title: Some(if display_name.is_empty() {
                    if chat_identifier.is_empty() { "local chat".to_string() } else { chat_identifier.clone() }
                } else {
                    display_name
                }),
                body_text: body,
                author: Some(if is_from_me != 0 { "me".to_string() } else { handle_id.clone() }),
                participants: if handle_id.is_empty() { vec![] } else { vec![handle_id] },
                timestamp_utc: Some(timestamp),
                deep_link: Some(format!("local-chat://message/{guid}")),
                metadata: json!({ "guid": guid, "is_from_me": is_from_me != 0, "service": service }),
                checksum,
            });
            max_rowid = max_rowid.max(rowid);
        }

        pool.close().await;

        let next_cursor = json!({
            "last_rowid": max_rowid,
            "synced_at": Utc::now().to_rfc3339(),
        });
        Ok(CollectedSync {
            documents,
            cursor: next_cursor,
            message: "chat-b sync completed".to_string(),
        })
    }
}

fn store_time_to_datetime(raw: i64) -> DateTime<Utc> {
    let seconds = if raw.abs() > 10_000_000_000 { raw / 1_000_000_000 } else { raw };
    Utc.timestamp_opt(STORE_EPOCH_OFFSET_SECS + seconds, 0).single().unwrap_or_else(Utc::now)
}

/// Extracts plain text from a typed-stream attributed-body blob: the text
/// lives between a `\x01+<len>` marker and a `\x86` terminator.
fn decode_attributed_body(blob: Option<&[u8]>) -> String {
    let Some(raw) = blob else { return String::new() };
    if let Some(captures) = ATTRIBUTED_BODY_PATTERN.captures(raw) {
        if let Some(matched) = captures.get(1) {
            let text = String::from_utf8_lossy(matched.as_bytes());
            let cleaned: String = text.chars().filter(|c| !c.is_control() || *c == '\n').collect();
            let cleaned = cleaned.trim().to_string();
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
    }
    String::from_utf8_lossy(raw).split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_typed_stream_marker() {
        let mut blob = vec![0x00, 0x01, 0x2b, 0x05];
        blob.extend_from_slice(b"hello");
        blob.push(0x86);
        assert_eq!(decode_attributed_body(Some(&blob)), "hello");
    }

    #[test]
    fn falls_back_to_naive_decode_without_marker() {
        let blob = b"plain noisy\x00text".to_vec();
        let decoded = decode_attributed_body(Some(&blob));
        assert!(decoded.contains("plain"));
    }

    #[test]
    fn empty_blob_yields_empty_string() {
        assert_eq!(decode_attributed_body(None), "");
    }
}
