use crate::stored_object;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemoryKind {
    UserPreference,
    SourceQuirk,
    ReasoningRule,
    GuardrailException,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryScope {
    Session,
    UserGlobal,
    SourceSpecific,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Proposed,
    Approved,
    Rejected,
}

stored_object!(MemoryCandidate, "memory_candidate", {
    kind: MemoryKind,
    scope: MemoryScope,
    title: String,
    learning: String,
    confidence: u8,
    evidence_citation_ids: Vec<String>,
    status: CandidateStatus,
    metadata: BTreeMap<String, String>,
    run_id: Option<String>
});

impl MemoryCandidate {
    /// Approval requires non-empty evidence; see `MemoryManager::approve`.
    pub fn has_evidence(&self) -> bool {
        !self.evidence_citation_ids.is_empty()
    }
}
