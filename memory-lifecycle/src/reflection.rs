//! Reflection Engine (C10): turns ask-run outcomes, SQL-run outcomes, and
//! direct feedback into reviewable memory candidate drafts. Unifies the two
//! reference engines (`dash/personal/learning.py`'s evidence-outcome
//! reflection and `dash/native/learning.py`'s SQL-error classification)
//! into one engine, since this implementation has a single ask path that
//! can end in either an evidence answer or a SQL answer.

use std::collections::BTreeMap;

use common::storage::types::memory_candidate::{MemoryKind, MemoryScope};
use common::storage::types::query_run::OutcomeClass;

/// An unreviewed memory candidate, not yet persisted. The caller assigns a
/// `run_id` and status before storing it as a `MemoryCandidate`.
#[derive(Debug, Clone)]
pub struct MemoryCandidateDraft {
    pub kind: MemoryKind,
    pub scope: MemoryScope,
    pub title: String,
    pub learning: String,
    pub confidence: u8,
    pub evidence_citation_ids: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

fn metadata(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn take(citations: &[String], n: usize) -> Vec<String> {
    citations.iter().take(n).cloned().collect()
}

pub struct ReflectionEngine;

impl ReflectionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Turns one ask run's outcome into reviewable memory candidates.
    pub fn from_ask_outcome(
        &self,
        question: &str,
        outcome_class: OutcomeClass,
        citations: &[String],
        missing_evidence: &[String],
        memory_used_count: usize,
        source_filters: &[String],
    ) -> Vec<MemoryCandidateDraft> {
        let mut drafts = Vec::new();

        if matches!(outcome_class, OutcomeClass::Success) && !citations.is_empty() {
            drafts.push(MemoryCandidateDraft {
                kind: MemoryKind::ReasoningRule,
                scope: MemoryScope::UserGlobal,
                title: "successful retrieval pattern".to_string(),
                learning: format!(
                    "Question pattern succeeded: {question}\nPreserve cited-answer workflow and prioritize retrieved evidence before synthesis."
                ),
                confidence: 70,
                evidence_citation_ids: take(citations, 3),
                metadata: metadata(&[
                    ("trigger", "success"),
                    ("memory_used", &memory_used_count.to_string()),
                ]),
            });
        }

        if matches!(
            outcome_class,
            OutcomeClass::Partial | OutcomeClass::Failure | OutcomeClass::HallucinationRisk
        ) {
            let trigger = match outcome_class {
                OutcomeClass::Partial => "partial",
                OutcomeClass::Failure => "failure",
                OutcomeClass::HallucinationRisk => "hallucination-risk",
                OutcomeClass::Success => unreachable!(),
            };
            drafts.push(MemoryCandidateDraft {
                kind: MemoryKind::GuardrailException,
                scope: MemoryScope::UserGlobal,
                title: "insufficient evidence fallback".to_string(),
                learning: "When retrieved evidence is weak, do not speculate. Return uncertainty with suggested filters/time ranges and ask for narrower scope.".to_string(),
                confidence: 88,
                evidence_citation_ids: take(citations, 2),
                metadata: metadata(&[
                    ("trigger", trigger),
                    ("missing_count", &missing_evidence.len().to_string()),
                ]),
            });
        }

        if !missing_evidence.is_empty() {
            drafts.push(MemoryCandidateDraft {
                kind: MemoryKind::UserPreference,
                scope: MemoryScope::UserGlobal,
                title: "prefer guidance when evidence missing".to_string(),
                learning: "If evidence is missing, provide explicit gaps and suggest source/time filters before attempting another answer.".to_string(),
                confidence: 78,
                evidence_citation_ids: take(citations, 2),
                metadata: metadata(&[("trigger", "missing_evidence")]),
            });
        }

        if !source_filters.is_empty() && !missing_evidence.is_empty() {
            for source in source_filters.iter().take(2) {
                drafts.push(MemoryCandidateDraft {
                    kind: MemoryKind::SourceQuirk,
                    scope: MemoryScope::SourceSpecific,
                    title: format!("{source} retrieval scope hint"),
                    learning: format!(
                        "For {source}, missing evidence often indicates scope or time filtering issues. Expand source-specific range before answering."
                    ),
                    confidence: 68,
                    evidence_citation_ids: take(citations, 2),
                    metadata: metadata(&[("source", source), ("trigger", "source_missing_evidence")]),
                });
            }
        }

        drafts
    }

    /// Turns a SQL run's outcome into memory candidates: an error yields a
    /// classified fix hint, a successful run with rows yields a reusable
    /// query-pattern hint, and a user-supplied correction always yields a
    /// preference hint.
    pub fn from_sql_outcome(
        &self,
        run_id: &str,
        question: &str,
        sql: Option<&str>,
        row_count: Option<usize>,
        error: Option<&str>,
        corrected_sql: Option<&str>,
    ) -> Vec<MemoryCandidateDraft> {
        let mut drafts = Vec::new();
        let synthetic_citation = vec![format!("sql_run:{run_id}")];

        if let Some(error) = error {
            let (category, confidence) = classify_sql_error(error);
            let fix = suggest_fix(category);
            let truncated_sql: String = sql.unwrap_or_default().chars().take(500).collect();

            if category == "schema_mismatch" {
                drafts.push(MemoryCandidateDraft {
                    kind: MemoryKind::SourceQuirk,
                    scope: MemoryScope::SourceSpecific,
                    title: format!("SQL schema: {category}"),
                    learning: format!("Schema issue for question: {question}\nError: {error}\nFix: {fix}"),
                    confidence,
                    evidence_citation_ids: synthetic_citation.clone(),
                    metadata: metadata(&[
                        ("trigger", "sql_error"),
                        ("category", category),
                        ("sql", &truncated_sql),
                    ]),
                });
            } else {
                drafts.push(MemoryCandidateDraft {
                    kind: MemoryKind::GuardrailException,
                    scope: MemoryScope::UserGlobal,
                    title: format!("SQL error: {category}"),
                    learning: format!("When querying about: {question}\nAvoid: {error}\nBecause: {fix}"),
                    confidence,
                    evidence_citation_ids: synthetic_citation.clone(),
                    metadata: metadata(&[
                        ("trigger", "sql_error"),
                        ("category", category),
                        ("sql", &truncated_sql),
                    ]),
                });
            }
        } else if let (Some(row_count), Some(sql)) = (row_count, sql) {
            let truncated_sql: String = sql.chars().take(500).collect();
            drafts.push(MemoryCandidateDraft {
                kind: MemoryKind::ReasoningRule,
                scope: MemoryScope::UserGlobal,
                title: "successful SQL pattern".to_string(),
                learning: format!(
                    "For questions about: {question}\nThis query pattern works: {truncated_sql}\nReturned {row_count} row(s)."
                ),
                confidence: 65,
                evidence_citation_ids: synthetic_citation.clone(),
                metadata: metadata(&[("trigger", "sql_success"), ("row_count", &row_count.to_string())]),
            });
        }

        if let Some(corrected_sql) = corrected_sql {
            let truncated: String = corrected_sql.chars().take(500).collect();
            drafts.push(MemoryCandidateDraft {
                kind: MemoryKind::UserPreference,
                scope: MemoryScope::UserGlobal,
                title: "user SQL correction".to_string(),
                learning: format!("User prefers this SQL pattern for: {question}\nCorrected SQL: {truncated}"),
                confidence: 80,
                evidence_citation_ids: synthetic_citation,
                metadata: metadata(&[("trigger", "sql_correction")]),
            });
        }

        drafts
    }

    /// Direct user feedback only produces candidates for an "incorrect"
    /// verdict; a "correct" verdict has nothing to learn from.
    pub fn from_feedback(
        &self,
        verdict_incorrect: bool,
        comment: Option<&str>,
        corrected_answer: Option<&str>,
        corrected_filters: &[String],
        corrected_source_scope: Option<&str>,
        evidence_citation_ids: &[String],
    ) -> Vec<MemoryCandidateDraft> {
        if !verdict_incorrect {
            return Vec::new();
        }

        let mut detail = Vec::new();
        if let Some(comment) = comment {
            detail.push(format!("User comment: {comment}"));
        }
        if let Some(answer) = corrected_answer {
            detail.push(format!("Corrected answer: {answer}"));
        }
        if !corrected_filters.is_empty() {
            detail.push(format!("Corrected filters: {}", corrected_filters.join(", ")));
        }
        if let Some(scope) = corrected_source_scope {
            detail.push(format!("Source scope note: {scope}"));
        }
        if detail.is_empty() {
            detail.push("User marked answer as incorrect without details.".to_string());
        }

        let mut drafts = vec![MemoryCandidateDraft {
            kind: MemoryKind::ReasoningRule,
            scope: MemoryScope::UserGlobal,
            title: "user correction received".to_string(),
            learning: detail.join("\n"),
            confidence: 75,
            evidence_citation_ids: evidence_citation_ids.to_vec(),
            metadata: metadata(&[("trigger", "feedback")]),
        }];

        for source in corrected_filters.iter().take(2) {
            drafts.push(MemoryCandidateDraft {
                kind: MemoryKind::SourceQuirk,
                scope: MemoryScope::SourceSpecific,
                title: format!("{source} correction pattern"),
                learning: format!(
                    "User correction indicates source-specific nuance for {source}. Prioritize this source and verify timestamps/participants before answering."
                ),
                confidence: 72,
                evidence_citation_ids: evidence_citation_ids.to_vec(),
                metadata: metadata(&[("trigger", "feedback"), ("source", source)]),
            });
        }

        drafts
    }
}

impl Default for ReflectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies an execution outcome from its evidence and error state.
pub fn classify_outcome(has_error: bool, has_evidence: bool, citations_valid: bool) -> OutcomeClass {
    if has_error {
        return OutcomeClass::Failure;
    }
    if !has_evidence {
        return OutcomeClass::Partial;
    }
    if !citations_valid {
        return OutcomeClass::HallucinationRisk;
    }
    OutcomeClass::Success
}

/// Classifies a raw SQL error message into a category and a confidence
/// score for the resulting memory candidate.
fn classify_sql_error(error: &str) -> (&'static str, u8) {
    let lower = error.to_lowercase();
    if lower.contains("does not exist") && lower.contains("column") {
        return ("schema_mismatch", 80);
    }
    if lower.contains("operator does not exist") || lower.contains("invalid input syntax") {
        return ("type_mismatch", 85);
    }
    if lower.contains("syntax error") {
        return ("sql_syntax", 65);
    }
    if lower.contains("statement timeout") || lower.contains("canceling statement due to statement timeout") {
        return ("query_timeout", 70);
    }
    if lower.contains("permission denied") {
        return ("permissions", 90);
    }
    ("execution_error", 60)
}

fn suggest_fix(category: &str) -> &'static str {
    match category {
        "schema_mismatch" => "Re-run schema introspection and verify column/table names.",
        "type_mismatch" => "Check data types and add explicit casts or quoted literals.",
        "sql_syntax" => "Validate SQL syntax and simplify the query.",
        "query_timeout" => "Reduce scanned rows, add filters, and verify indexes.",
        "permissions" => "Use allowed schemas/tables with the read-only role.",
        _ => "Inspect query and error details, then retry with tighter constraints.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_schema_mismatch() {
        let (category, confidence) = classify_sql_error("column \"foo\" does not exist");
        assert_eq!(category, "schema_mismatch");
        assert_eq!(confidence, 80);
    }

    #[test]
    fn classifies_permissions_with_highest_confidence() {
        let (category, confidence) = classify_sql_error("permission denied for table documents");
        assert_eq!(category, "permissions");
        assert_eq!(confidence, 90);
    }

    #[test]
    fn unrecognized_error_falls_back_to_execution_error() {
        let (category, confidence) = classify_sql_error("connection reset by peer");
        assert_eq!(category, "execution_error");
        assert_eq!(confidence, 60);
    }

    #[test]
    fn success_outcome_with_citations_yields_reasoning_rule() {
        let engine = ReflectionEngine::new();
        let drafts = engine.from_ask_outcome(
            "what happened with the launch",
            OutcomeClass::Success,
            &["run-1:1".to_string()],
            &[],
            2,
            &[],
        );
        assert_eq!(drafts.len(), 1);
        assert!(matches!(drafts[0].kind, MemoryKind::ReasoningRule));
    }

    #[test]
    fn feedback_with_correct_verdict_yields_nothing() {
        let engine = ReflectionEngine::new();
        assert!(engine
            .from_feedback(false, None, None, &[], None, &[])
            .is_empty());
    }

    #[test]
    fn sql_success_yields_reasoning_rule() {
        let engine = ReflectionEngine::new();
        let drafts = engine.from_sql_outcome("run-1", "top accounts", Some("select 1"), Some(3), None, None);
        assert_eq!(drafts.len(), 1);
        assert!(matches!(drafts[0].kind, MemoryKind::ReasoningRule));
    }
}
