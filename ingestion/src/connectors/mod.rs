//! Source connectors: read-only pullers of incremental records from one
//! personal data source each, normalized into the shared document payload
//! shape. A connector never writes back to its source; cursor persistence
//! is the coordinator's job.

pub mod local_files;
pub mod local_message_db;
pub mod mail;
pub mod threaded_chat;

use async_trait::async_trait;
use common::error::AppError;
use corpus_store::DocumentPayload;
use serde_json::Value;

/// Result of one `collect` pass: raw documents plus the new high-water-mark
/// cursor (not a delta) the coordinator should merge into `SourceState`.
pub struct CollectedSync {
    pub documents: Vec<DocumentPayload>,
    pub cursor: Value,
    pub message: String,
}

#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn source(&self) -> &'static str;

    /// Validates credentials/availability; may seed the cursor from an
    /// externally supplied value (e.g. a freshly granted refresh token).
    async fn connect(&mut self, seed_cursor: Option<Value>) -> Result<(), AppError>;

    /// Pulls records strictly newer than the last cursor (or everything,
    /// when `full`), returning them unchunked for the coordinator to batch.
    async fn collect(&mut self, cursor: Option<Value>, full: bool) -> Result<CollectedSync, AppError>;
}

/// Builds a fresh connector for `source`, matching the four roles this
/// system knows about: `mail` (OAuth mail), `chat-a` (token-based threaded
/// chat), `chat-b` (local message db), `files` (local filesystem). `None`
/// for any other source string, including unknown/unregistered ones.
pub fn connector_for(source: &str, data_dir: &str) -> Option<Box<dyn SourceConnector>> {
    match source {
        "mail" => Some(Box::new(mail::MailConnector::new(data_dir.to_string()))),
        "chat-a" => Some(Box::new(threaded_chat::ThreadedChatConnector::new(data_dir.to_string()))),
        "chat-b" => Some(Box::new(local_message_db::LocalMessageDbConnector::new(data_dir.to_string()))),
        "files" => Some(Box::new(local_files::LocalFilesConnector::new(Vec::new()))),
        _ => None,
    }
}

pub fn cursor_get_str<'a>(cursor: &'a Value, key: &str) -> Option<&'a str> {
    cursor.get(key).and_then(Value::as_str)
}

pub fn cursor_get_i64(cursor: &Value, key: &str) -> i64 {
    cursor.get(key).and_then(Value::as_i64).unwrap_or(0)
}

pub fn cursor_get_f64(cursor: &Value, key: &str) -> f64 {
    cursor.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}
