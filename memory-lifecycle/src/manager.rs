//! Memory Manager (C9): selects active memories relevant to a question,
//! and drives the candidate→item lifecycle (approve/reject/deprecate),
//! including automatic demotion of conflicting memories.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::memory_candidate::{CandidateStatus, MemoryCandidate};
use common::storage::types::memory_event::{MemoryEvent, MemoryEventKind};
use common::storage::types::memory_item::{ActivationState, MemoryItem};
use common::text::{contains_negation, tokenize};
use uuid::Uuid;

/// Memory candidates below this confidence never compete for a question.
const MIN_CONFIDENCE: u8 = 60;
/// Minimum lexical-overlap score for a memory to be considered relevant.
const MIN_RELEVANCE_SCORE: f64 = 0.15;
/// Minimum token-overlap ratio (of the shorter statement) for two memories
/// to be considered about the same thing before checking for negation.
const CONFLICT_OVERLAP_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct MemorySelection {
    pub used: Vec<MemoryItem>,
    pub skipped: Vec<MemoryItem>,
}

pub struct MemoryManager {
    store: Arc<SurrealDbClient>,
}

impl MemoryManager {
    pub fn new(store: Arc<SurrealDbClient>) -> Self {
        Self { store }
    }

    /// Selects up to `top_k` active memories relevant to `question`, scored
    /// by lexical overlap. `source_filters` excludes source-specific
    /// memories scoped to a different source than the ones requested.
    pub async fn select_for_question(
        &self,
        question: &str,
        source_filters: &[String],
        top_k: usize,
    ) -> Result<MemorySelection, AppError> {
        let items: Vec<MemoryItem> = self
            .store
            .get_all_stored_items::<MemoryItem>()
            .await?
            .into_iter()
            .filter(MemoryItem::is_active)
            .collect();
        let question_tokens = tokenize(question);

        let mut scored: Vec<(f64, MemoryItem)> = Vec::new();
        let mut skipped: Vec<MemoryItem> = Vec::new();

        for item in items {
            if item.confidence < MIN_CONFIDENCE {
                skipped.push(item);
                continue;
            }
            if matches!(
                item.scope,
                common::storage::types::memory_candidate::MemoryScope::SourceSpecific
            ) && !source_filters.is_empty()
            {
                let mem_source = item
                    .metadata
                    .get("source")
                    .map(|s| s.trim().to_lowercase())
                    .unwrap_or_default();
                if !mem_source.is_empty()
                    && !source_filters.iter().any(|f| f.to_lowercase() == mem_source)
                {
                    skipped.push(item);
                    continue;
                }
            }

            let item_tokens = tokenize(&item.statement);
            let overlap = question_tokens.intersection(&item_tokens).count();
            if overlap == 0 {
                skipped.push(item);
                continue;
            }
            let score = overlap as f64 / question_tokens.len().max(1) as f64;
            if score < MIN_RELEVANCE_SCORE {
                skipped.push(item);
                continue;
            }
            scored.push((score, item));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        let used: Vec<MemoryItem> = scored.iter().take(top_k).map(|(_, i)| i.clone()).collect();
        if scored.len() > top_k {
            skipped.extend(scored.into_iter().skip(top_k).map(|(_, i)| i));
        }

        Ok(MemorySelection { used, skipped })
    }

    /// Approves a proposed candidate, activates a new memory item from it,
    /// and demotes any conflicting active memory. Returns the activated item
    /// and the ids of any items demoted in the process.
    pub async fn approve_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<(MemoryItem, Vec<String>), AppError> {
        let candidate = self
            .store
            .get_item::<MemoryCandidate>(candidate_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("memory candidate {candidate_id} not found")))?;

        if !candidate.has_evidence() {
            return Err(AppError::Validation(
                "memory candidate requires evidence citations before activation".into(),
            ));
        }

        let mut approved = candidate.clone();
        approved.status = CandidateStatus::Approved;
        self.store.update_item(candidate_id, approved).await?;

        let now = Utc::now();
        let item_id = Uuid::new_v4().to_string();
        let mut metadata = BTreeMap::new();
        metadata.insert("candidate_id".to_string(), candidate_id.to_string());
        metadata.insert("title".to_string(), candidate.title.clone());
        metadata.insert(
            "evidence_citation_ids".to_string(),
            candidate.evidence_citation_ids.join(","),
        );

        let item = MemoryItem {
            id: item_id.clone(),
            created_at: now,
            updated_at: now,
            kind: candidate.kind,
            scope: candidate.scope,
            statement: candidate.learning.trim().to_string(),
            activation_state: ActivationState::Active,
            confidence: candidate.confidence,
            source: "candidate_approval".to_string(),
            supersedes_id: None,
            last_verified_at: now,
            expiry_at: None,
            metadata,
        };
        self.store.store_item(item.clone()).await?;
        self.record_event(
            MemoryEventKind::Approved,
            Some(item_id.clone()),
            Some(candidate_id.to_string()),
            Some("candidate approved by user".to_string()),
        )
        .await?;

        let demoted = self.demote_conflicts(&item).await?;
        let final_item = self
            .store
            .get_item::<MemoryItem>(&item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("failed to load approved memory item {item_id}")))?;
        Ok((final_item, demoted))
    }

    pub async fn reject_candidate(&self, candidate_id: &str) -> Result<(), AppError> {
        let mut candidate = self
            .store
            .get_item::<MemoryCandidate>(candidate_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("memory candidate {candidate_id} not found")))?;
        candidate.status = CandidateStatus::Rejected;
        self.store.update_item(candidate_id, candidate).await?;
        self.record_event(
            MemoryEventKind::Rejected,
            None,
            Some(candidate_id.to_string()),
            Some("candidate rejected by user".to_string()),
        )
        .await
    }

    pub async fn deprecate_item(&self, item_id: &str) -> Result<(), AppError> {
        let mut item = self
            .store
            .get_item::<MemoryItem>(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("memory item {item_id} not found")))?;
        item.activation_state = ActivationState::Deprecated;
        self.store.update_item(item_id, item).await?;
        self.record_event(
            MemoryEventKind::Deprecated,
            Some(item_id.to_string()),
            None,
            Some("memory manually deprecated".to_string()),
        )
        .await
    }

    /// Demotes the weaker side of any same-kind/same-scope conflicting
    /// active memory to `Stale`. Stops at the first conflict that demotes
    /// `new_item` itself, matching the reference implementation's early
    /// return (a stale item cannot itself demote anything further).
    async fn demote_conflicts(&self, new_item: &MemoryItem) -> Result<Vec<String>, AppError> {
        let active: Vec<MemoryItem> = self
            .store
            .get_all_stored_items::<MemoryItem>()
            .await?
            .into_iter()
            .filter(|i| i.is_active() && i.id != new_item.id)
            .collect();

        let mut demoted = Vec::new();
        for other in active {
            if other.kind != new_item.kind || other.scope != new_item.scope {
                continue;
            }
            if !is_conflicting(&new_item.statement, &other.statement) {
                continue;
            }

            let (mut stale_item, winner_id) = if other.confidence <= new_item.confidence {
                (other, new_item.id.clone())
            } else {
                (new_item.clone(), other.id.clone())
            };
            let stale_id = stale_item.id.clone();
            stale_item.activation_state = ActivationState::Stale;
            stale_item.supersedes_id = Some(winner_id.clone());
            self.store.update_item(&stale_id, stale_item).await?;
            self.record_event(
                MemoryEventKind::AutoStale,
                Some(stale_id.clone()),
                None,
                Some(format!("conflicts with stronger memory {winner_id}")),
            )
            .await?;
            demoted.push(stale_id.clone());

            if stale_id == new_item.id {
                return Ok(demoted);
            }
        }
        Ok(demoted)
    }

    async fn record_event(
        &self,
        kind: MemoryEventKind,
        memory_item_id: Option<String>,
        candidate_id: Option<String>,
        reason: Option<String>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        self.store
            .store_item(MemoryEvent {
                id: Uuid::new_v4().to_string(),
                created_at: now,
                updated_at: now,
                memory_item_id,
                candidate_id,
                kind,
                reason,
            })
            .await?;
        Ok(())
    }
}

/// Heuristic contradiction detector for short guidance statements: high
/// token overlap (relative to the shorter statement) plus disagreement on
/// whether either statement contains a negation marker.
fn is_conflicting(a: &str, b: &str) -> bool {
    let a_tokens = tokenize(a);
    let b_tokens = tokenize(b);
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return false;
    }
    let shorter = a_tokens.len().min(b_tokens.len()).max(1);
    let overlap = a_tokens.intersection(&b_tokens).count() as f64 / shorter as f64;
    if overlap < CONFLICT_OVERLAP_THRESHOLD {
        return false;
    }
    contains_negation(a) != contains_negation(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_statements_detected_by_negation_disagreement() {
        assert!(is_conflicting(
            "Always cite the Lewis thread when asked about launch metrics",
            "Do not cite the Lewis thread when asked about launch metrics",
        ));
    }

    #[test]
    fn agreeing_statements_are_not_conflicting() {
        assert!(!is_conflicting(
            "Always cite the Lewis thread when asked about launch metrics",
            "Always cite the Lewis thread for launch metrics questions",
        ));
    }

    #[test]
    fn unrelated_statements_are_not_conflicting() {
        assert!(!is_conflicting(
            "Prefer chat-a over mail for quick questions",
            "Files older than a year are rarely relevant",
        ));
    }
}
