use crate::stored_object;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEventKind {
    Approved,
    Rejected,
    AutoStale,
    Deprecated,
}

stored_object!(MemoryEvent, "memory_event", {
    memory_item_id: Option<String>,
    candidate_id: Option<String>,
    kind: MemoryEventKind,
    reason: Option<String>
});
