use crate::stored_object;
use chrono::{DateTime, Utc};
use serde_json::Value;

stored_object!(SourceState, "source_state", {
    source: String,
    connected: bool,
    last_sync_at: Option<DateTime<Utc>>,
    cursor: Value
});

/// The known source identifiers, seeded with `connected=false` on first use.
pub const KNOWN_SOURCES: [&str; 4] = ["mail", "chat-a", "chat-b", "files"];
