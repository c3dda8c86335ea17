use super::memory_candidate::{MemoryKind, MemoryScope};
use crate::stored_object;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Active,
    Stale,
    Deprecated,
}

stored_object!(MemoryItem, "memory_item", {
    kind: MemoryKind,
    scope: MemoryScope,
    statement: String,
    activation_state: ActivationState,
    confidence: u8,
    source: String,
    supersedes_id: Option<String>,
    last_verified_at: DateTime<Utc>,
    expiry_at: Option<DateTime<Utc>>,
    metadata: BTreeMap<String, String>
});

impl MemoryItem {
    pub fn is_active(&self) -> bool {
        matches!(self.activation_state, ActivationState::Active)
    }
}
