//! Ask Orchestrator (C11): one unified state machine for every question,
//! merging `dash/orchestrator.py::VaultOrchestrator`, the native (SQL) path
//! from `dash/native/orchestrator.py`, and the evidence path from
//! `dash/personal/orchestrator.py` into a single `accepted -> route ->
//! select_memory -> execute_path -> reflect -> finalize` run.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use common::error::AppError;
use common::oracle::TextOracle;
use common::storage::db::SurrealDbClient;
use common::storage::types::citation::Citation;
use common::storage::types::memory_candidate::{CandidateStatus, MemoryCandidate};
use common::storage::types::memory_item::MemoryItem;
use common::storage::types::memory_usage::MemoryUsage;
use common::storage::types::query_run::{OutcomeClass, QueryRun, RunMode, RunStatus};
use common::storage::types::sql_attempt::SqlAttempt;
use corpus_store::guardrail::{self, GuardrailConfig};
use corpus_store::executor::SqlExecutor;
use memory_lifecycle::{MemoryManager, MemoryCandidateDraft, ReflectionEngine};
use retrieval::{HybridRetriever, RetrievalFilters};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::drafter::{SqlDrafter, FALLBACK_SQL};
use crate::router::{IntentRouter, RouteDecision};
use crate::state::accepted;
use crate::types::{run_mode_from_route, AskDebug, AskRequest, AskResponse, CitationView, SqlAttemptView};

const MERGE_SYSTEM: &str = "You are a helpful assistant. Combine the following two partial \
answers into a single coherent response. Preserve any citation markers. Be concise (3-5 \
sentences).";

const ROW_SUMMARY_SYSTEM: &str = "You summarize SQL query result rows into a concise, factual \
answer (1-3 sentences). Use only the provided rows, never invent values.";

const EVIDENCE_SYSTEM: &str = "You answer questions using ONLY the cited evidence provided. \
Reference citations as [1], [2], etc. Be concise (2-4 sentences). If the evidence is \
insufficient, say so clearly. Never fabricate information.";

pub struct AskOrchestrator {
    bookkeeping: Arc<SurrealDbClient>,
    retriever: Arc<HybridRetriever>,
    memory: Arc<MemoryManager>,
    reflection: ReflectionEngine,
    router: IntentRouter,
    drafter: SqlDrafter,
    executor: SqlExecutor,
    guardrail: GuardrailConfig,
    oracle: Arc<dyn TextOracle>,
}

struct StructuredOutcome {
    status: RunStatus,
    answer: Option<String>,
    sql: Option<String>,
    rows: Option<Vec<Map<String, Value>>>,
    row_count: Option<usize>,
    attempts: Vec<SqlAttemptView>,
    error: Option<String>,
}

struct EvidenceOutcome {
    status: RunStatus,
    answer: Option<String>,
    citations: Vec<CitationView>,
    missing_evidence: Vec<String>,
    outcome_class: OutcomeClass,
    error: Option<String>,
}

impl AskOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookkeeping: Arc<SurrealDbClient>,
        retriever: Arc<HybridRetriever>,
        memory: Arc<MemoryManager>,
        router: IntentRouter,
        drafter: SqlDrafter,
        executor: SqlExecutor,
        guardrail: GuardrailConfig,
        oracle: Arc<dyn TextOracle>,
    ) -> Self {
        Self {
            bookkeeping,
            retriever,
            memory,
            reflection: ReflectionEngine::new(),
            router,
            drafter,
            executor,
            guardrail,
            oracle,
        }
    }

    /// Runs one ask end to end. `force_mode` lets a caller (e.g. a saved
    /// eval scenario, or an explicit `/native` style endpoint) bypass intent
    /// classification; `None` routes through the shared oracle classifier.
    pub async fn run_ask(&self, request: AskRequest, force_mode: Option<RouteDecision>) -> AskResponse {
        let run_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut run = QueryRun {
            id: run_id.clone(),
            created_at: now,
            updated_at: now,
            question: request.question.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            mode: None,
            status: RunStatus::Accepted,
            answer: None,
            error: None,
            outcome_class: None,
            retries: 1,
            missing_evidence: Vec::new(),
        };

        if let Err(err) = self.bookkeeping.store_item(run.clone()).await {
            return AskResponse::failed(run_id, format!("failed to record ask run: {err}"));
        }
        let machine = accepted();

        let route = match force_mode {
            Some(mode) => mode,
            None => self.router.classify(&request.question).await,
        };
        let machine = match machine.route() {
            Ok(m) => m,
            Err((_, guard)) => return self.abort(run, format!("routing transition rejected: {guard:?}")).await,
        };
        run.mode = Some(run_mode_from_route(route));

        let selection = match self
            .memory
            .select_for_question(&request.question, &request.source_filters, 4)
            .await
        {
            Ok(selection) => selection,
            Err(err) => {
                warn!(error = %err, "memory selection failed, proceeding without memory");
                memory_lifecycle::MemorySelection::default()
            }
        };
        let machine = match machine.select_memory() {
            Ok(m) => m,
            Err((_, guard)) => return self.abort(run, format!("memory transition rejected: {guard:?}")).await,
        };
        let memory_used_ids: Vec<String> = selection.used.iter().map(|m| m.id.clone()).collect();

        let (status, answer, sql, rows, citations, missing_evidence, error, outcome_class, debug) =
            match route {
                RouteDecision::Structured => {
                    let outcome = self
                        .execute_structured(&request, &run_id, &selection.used)
                        .await;
                    let outcome_class = if matches!(outcome.status, RunStatus::Success) {
                        OutcomeClass::Success
                    } else {
                        OutcomeClass::Failure
                    };
                    self.reflect_structured(&request.question, &run_id, &outcome)
                        .await;
                    let debug = AskDebug {
                        memory_used: memory_used_ids.clone(),
                        memory_skipped: selection.skipped.iter().map(|m| m.id.clone()).collect(),
                        sql_attempts: outcome.attempts.clone(),
                    };
                    (
                        outcome.status,
                        outcome.answer,
                        outcome.sql,
                        outcome.rows,
                        Vec::new(),
                        Vec::new(),
                        outcome.error,
                        outcome_class,
                        debug,
                    )
                }
                RouteDecision::Evidence => {
                    let outcome = self.execute_evidence(&request, &run_id, &selection.used).await;
                    self.record_memory_usage(&run_id, &selection.used, &selection.skipped)
                        .await;
                    self.reflect_evidence(&request, &run_id, &outcome).await;
                    let debug = AskDebug {
                        memory_used: memory_used_ids.clone(),
                        memory_skipped: selection.skipped.iter().map(|m| m.id.clone()).collect(),
                        sql_attempts: Vec::new(),
                    };
                    (
                        outcome.status,
                        outcome.answer,
                        None,
                        None,
                        outcome.citations,
                        outcome.missing_evidence,
                        outcome.error,
                        outcome.outcome_class,
                        debug,
                    )
                }
                RouteDecision::Both => {
                    let structured = self
                        .execute_structured(&request, &run_id, &selection.used)
                        .await;
                    let evidence = self.execute_evidence(&request, &run_id, &selection.used).await;
                    self.record_memory_usage(&run_id, &selection.used, &selection.skipped)
                        .await;
                    self.reflect_structured(&request.question, &run_id, &structured)
                        .await;
                    self.reflect_evidence(&request, &run_id, &evidence).await;

                    let merged = self
                        .merge_answers(structured.answer.as_deref(), evidence.answer.as_deref())
                        .await;
                    let succeeded = matches!(structured.status, RunStatus::Success)
                        || matches!(evidence.status, RunStatus::Success);
                    let status = if succeeded {
                        RunStatus::Success
                    } else {
                        RunStatus::Failed
                    };
                    let outcome_class = if succeeded {
                        evidence.outcome_class
                    } else {
                        OutcomeClass::Failure
                    };
                    let error = if succeeded {
                        None
                    } else {
                        combine_errors(structured.error.as_deref(), evidence.error.as_deref())
                    };
                    let debug = AskDebug {
                        memory_used: memory_used_ids.clone(),
                        memory_skipped: selection.skipped.iter().map(|m| m.id.clone()).collect(),
                        sql_attempts: structured.attempts.clone(),
                    };
                    (
                        status,
                        merged,
                        structured.sql,
                        structured.rows,
                        evidence.citations,
                        evidence.missing_evidence,
                        error,
                        outcome_class,
                        debug,
                    )
                }
            };

        let machine = match machine.execute_path() {
            Ok(m) => m,
            Err((_, guard)) => return self.abort(run, format!("execute transition rejected: {guard:?}")).await,
        };
        let machine = match machine.reflect() {
            Ok(m) => m,
            Err((_, guard)) => return self.abort(run, format!("reflect transition rejected: {guard:?}")).await,
        };
        if machine.finalize().is_err() {
            warn!(run_id = %run_id, "finalize transition rejected, persisting terminal state anyway");
        }

        run.status = status;
        run.answer = answer.clone();
        run.error = error.clone();
        run.outcome_class = Some(outcome_class);
        run.missing_evidence = missing_evidence.clone();
        run.updated_at = Utc::now();
        if let Err(err) = self.bookkeeping.update_item(&run_id, run).await {
            warn!(error = %err, run_id = %run_id, "failed to persist final run state");
        }

        AskResponse {
            run_id,
            status,
            mode: Some(run_mode_from_route(route)),
            answer,
            sql,
            rows,
            citations,
            missing_evidence,
            memory_used: memory_used_ids,
            error,
            debug: if request.include_debug { Some(debug) } else { None },
            created_at: now,
        }
    }

    async fn abort(&self, mut run: QueryRun, reason: String) -> AskResponse {
        warn!(run_id = %run.id, reason = %reason, "ask run aborted before completion");
        run.status = RunStatus::Failed;
        run.error = Some(reason.clone());
        run.updated_at = Utc::now();
        let run_id = run.id.clone();
        let _ = self.bookkeeping.update_item(&run_id, run).await;
        AskResponse::failed(run_id, reason)
    }

    async fn execute_structured(
        &self,
        request: &AskRequest,
        run_id: &str,
        memory_used: &[MemoryItem],
    ) -> StructuredOutcome {
        let filters = RetrievalFilters {
            sources: request.source_filters.clone(),
            time_from: request.time_from,
            time_to: request.time_to,
        };
        let contexts = match self.retriever.retrieve(&request.question, filters, 6).await {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(error = %err, "context retrieval for sql drafting failed");
                Vec::new()
            }
        };
        let hints = memory_hints(memory_used);
        let draft = self.drafter.draft(&request.question, &contexts, &hints).await;

        let primary = match guardrail::validate_and_normalize_sql(&draft.sql, &self.guardrail) {
            Ok(sql) => sql,
            Err(err) => {
                let message = AppError::SqlGuardrail(err.to_string()).to_string();
                self.persist_attempt(run_id, 1, &draft.sql, Some(&message)).await;
                return StructuredOutcome {
                    status: RunStatus::Failed,
                    answer: None,
                    sql: Some(draft.sql.clone()),
                    rows: None,
                    row_count: None,
                    attempts: vec![SqlAttemptView {
                        attempt_number: 1,
                        sql: draft.sql,
                        error: Some(message.clone()),
                    }],
                    error: Some(message),
                };
            }
        };

        let mut candidates = vec![primary.clone()];
        if request.max_sql_attempts > 1 {
            if let Ok(fallback) = guardrail::validate_and_normalize_sql(FALLBACK_SQL, &self.guardrail) {
                if fallback.trim().to_lowercase() != primary.trim().to_lowercase() {
                    candidates.push(fallback);
                }
            }
        }

        let attempt_limit = candidates.len().min(request.max_sql_attempts.max(1) as usize);
        let mut attempts = Vec::new();
        let mut final_sql = primary;
        let mut last_error: Option<String> = None;
        let mut rows: Option<Vec<Map<String, Value>>> = None;

        for (idx, candidate_sql) in candidates.iter().take(attempt_limit).enumerate() {
            let attempt_number = (idx + 1) as u32;
            final_sql = candidate_sql.clone();
            match self.executor.execute(candidate_sql).await {
                Ok(result) => {
                    self.persist_attempt(run_id, attempt_number, candidate_sql, None).await;
                    attempts.push(SqlAttemptView {
                        attempt_number,
                        sql: candidate_sql.clone(),
                        error: None,
                    });
                    rows = Some(result.rows);
                    last_error = None;
                    break;
                }
                Err(err) => {
                    let message = err.to_string();
                    self.persist_attempt(run_id, attempt_number, candidate_sql, Some(&message))
                        .await;
                    attempts.push(SqlAttemptView {
                        attempt_number,
                        sql: candidate_sql.clone(),
                        error: Some(message.clone()),
                    });
                    last_error = Some(message);
                }
            }
        }

        match rows {
            Some(rows) => {
                let row_count = rows.len();
                let answer = self.synthesize_structured_answer(&request.question, &rows).await;
                StructuredOutcome {
                    status: RunStatus::Success,
                    answer: Some(answer),
                    sql: Some(final_sql),
                    rows: Some(rows),
                    row_count: Some(row_count),
                    attempts,
                    error: None,
                }
            }
            None => {
                let message = AppError::SqlExecution(last_error.unwrap_or_default()).to_string();
                StructuredOutcome {
                    status: RunStatus::Failed,
                    answer: None,
                    sql: Some(final_sql),
                    rows: None,
                    row_count: None,
                    attempts,
                    error: Some(message),
                }
            }
        }
    }

    async fn synthesize_structured_answer(&self, question: &str, rows: &[Map<String, Value>]) -> String {
        if rows.is_empty() {
            return "No matching rows were found.".to_string();
        }
        let preview: Vec<&Map<String, Value>> = rows.iter().take(20).collect();
        let preview_json = serde_json::to_string(&preview).unwrap_or_default();
        let user = format!("Question: {question}\n\nRows (JSON):\n{preview_json}");
        match self.oracle.complete(ROW_SUMMARY_SYSTEM, &user, 0.2, 300).await {
            Ok(text) if !text.trim().is_empty() => text,
            _ => deterministic_row_summary(question, rows),
        }
    }

    async fn execute_evidence(
        &self,
        request: &AskRequest,
        run_id: &str,
        memory_used: &[MemoryItem],
    ) -> EvidenceOutcome {
        let filters = RetrievalFilters {
            sources: request.source_filters.clone(),
            time_from: request.time_from,
            time_to: request.time_to,
        };
        let retrieved = match self
            .retriever
            .retrieve(&request.question, filters, request.top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(err) => {
                return EvidenceOutcome {
                    status: RunStatus::Failed,
                    answer: None,
                    citations: Vec::new(),
                    missing_evidence: Vec::new(),
                    outcome_class: OutcomeClass::Failure,
                    error: Some(format!("evidence retrieval failed: {err}")),
                };
            }
        };

        if retrieved.is_empty() {
            return EvidenceOutcome {
                status: RunStatus::Success,
                answer: Some(
                    "Insufficient evidence found in indexed personal sources. Try narrowing \
                     source filters or a shorter date range."
                        .to_string(),
                ),
                citations: Vec::new(),
                missing_evidence: missing_evidence_hints(request),
                outcome_class: OutcomeClass::Partial,
                error: None,
            };
        }

        let take_n = retrieved.len().min(8);
        let mut citations = Vec::with_capacity(take_n);
        for (idx, chunk) in retrieved.iter().take(take_n).enumerate() {
            let rank = (idx + 1) as u32;
            let now = Utc::now();
            let citation = Citation {
                id: Citation::deterministic_id(run_id, rank),
                created_at: now,
                updated_at: now,
                run_id: run_id.to_string(),
                chunk_id: chunk.chunk_id.clone(),
                source: chunk.source.clone(),
                title: chunk.title.clone(),
                snippet: truncate(&chunk.text, 400),
                author: chunk.author.clone(),
                timestamp_utc: chunk.timestamp_utc,
                deep_link: chunk.deep_link.clone(),
                rank,
                score: chunk.score,
            };
            if let Err(err) = self.bookkeeping.store_item(citation.clone()).await {
                warn!(error = %err, run_id = %run_id, "failed to persist citation");
            }
            citations.push(CitationView {
                citation_id: citation.id,
                source: citation.source,
                title: citation.title,
                snippet: citation.snippet,
                author: citation.author,
                timestamp: citation.timestamp_utc,
                deep_link: citation.deep_link,
                confidence: citation.score,
            });
        }

        let unique_ids: HashSet<&String> = citations.iter().map(|c| &c.citation_id).collect();
        let citations_valid = !citations.is_empty() && unique_ids.len() == citations.len();

        if !citations_valid {
            return EvidenceOutcome {
                status: RunStatus::Success,
                answer: Some(
                    "Insufficient validated evidence to answer safely. Please retry with \
                     narrower filters."
                        .to_string(),
                ),
                citations,
                missing_evidence: missing_evidence_hints(request),
                outcome_class: OutcomeClass::HallucinationRisk,
                error: None,
            };
        }

        let answer = self
            .compose_evidence_answer(&request.question, &citations, memory_used)
            .await;
        EvidenceOutcome {
            status: RunStatus::Success,
            answer: Some(answer),
            citations,
            missing_evidence: Vec::new(),
            outcome_class: OutcomeClass::Success,
            error: None,
        }
    }

    async fn compose_evidence_answer(
        &self,
        question: &str,
        citations: &[CitationView],
        memory_used: &[MemoryItem],
    ) -> String {
        let top = &citations[..citations.len().min(5)];
        let evidence_block = top
            .iter()
            .enumerate()
            .map(|(idx, c)| format!("[{}] ({}) {}", idx + 1, c.source, c.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        let memory_hint = {
            let hints = memory_hints(memory_used);
            if hints.is_empty() {
                String::new()
            } else {
                format!("\nMemory guidance: {}", hints.join("; "))
            }
        };

        let user = format!("Question: {question}\n\nEvidence:\n{evidence_block}{memory_hint}");
        match self.oracle.complete(EVIDENCE_SYSTEM, &user, 0.2, 512).await {
            Ok(text) if !text.trim().is_empty() => text,
            _ => format!("Answer for: {question}\nBased only on the cited evidence:\n{evidence_block}{memory_hint}"),
        }
    }

    async fn merge_answers(&self, structured: Option<&str>, evidence: Option<&str>) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(answer) = structured {
            parts.push(format!("Data answer: {answer}"));
        }
        if let Some(answer) = evidence {
            parts.push(format!("Personal answer: {answer}"));
        }
        match parts.len() {
            0 => None,
            1 => parts.into_iter().next(),
            _ => {
                let user = parts.join("\n\n");
                match self.oracle.complete(MERGE_SYSTEM, &user, 0.2, 512).await {
                    Ok(text) if !text.trim().is_empty() => Some(text),
                    _ => Some(user),
                }
            }
        }
    }

    async fn reflect_structured(&self, question: &str, run_id: &str, outcome: &StructuredOutcome) {
        let drafts = self.reflection.from_sql_outcome(
            run_id,
            question,
            outcome.sql.as_deref(),
            outcome.row_count,
            outcome.error.as_deref(),
            None,
        );
        self.persist_drafts(run_id, drafts).await;
    }

    async fn reflect_evidence(&self, request: &AskRequest, run_id: &str, outcome: &EvidenceOutcome) {
        let citation_ids: Vec<String> = outcome.citations.iter().map(|c| c.citation_id.clone()).collect();
        let drafts = self.reflection.from_ask_outcome(
            &request.question,
            outcome.outcome_class,
            &citation_ids,
            &outcome.missing_evidence,
            citation_ids.len(),
            &request.source_filters,
        );
        self.persist_drafts(run_id, drafts).await;
    }

    async fn persist_drafts(&self, run_id: &str, drafts: Vec<MemoryCandidateDraft>) {
        for draft in drafts {
            if draft.evidence_citation_ids.is_empty() {
                continue;
            }
            let now = Utc::now();
            let candidate = MemoryCandidate {
                id: Uuid::new_v4().to_string(),
                created_at: now,
                updated_at: now,
                kind: draft.kind,
                scope: draft.scope,
                title: draft.title,
                learning: draft.learning,
                confidence: draft.confidence,
                evidence_citation_ids: draft.evidence_citation_ids,
                status: CandidateStatus::Proposed,
                metadata: draft.metadata,
                run_id: Some(run_id.to_string()),
            };
            if let Err(err) = self.bookkeeping.store_item(candidate).await {
                warn!(error = %err, run_id = %run_id, "failed to persist memory candidate");
            }
        }
    }

    async fn record_memory_usage(&self, run_id: &str, used: &[MemoryItem], skipped: &[MemoryItem]) {
        for item in used {
            self.store_memory_usage(run_id, &item.id, 0.75, true, "retrieved for question").await;
        }
        for item in skipped {
            self.store_memory_usage(run_id, &item.id, 0.0, false, "not relevant to question")
                .await;
        }
    }

    async fn store_memory_usage(&self, run_id: &str, item_id: &str, influence: f64, applied: bool, reason: &str) {
        let now = Utc::now();
        let usage = MemoryUsage {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            run_id: run_id.to_string(),
            memory_item_id: item_id.to_string(),
            influence_score: influence,
            applied,
            reason: reason.to_string(),
        };
        if let Err(err) = self.bookkeeping.store_item(usage).await {
            warn!(error = %err, run_id = %run_id, "failed to persist memory usage");
        }
    }

    async fn persist_attempt(&self, run_id: &str, attempt_number: u32, sql: &str, error: Option<&str>) {
        let now = Utc::now();
        let attempt = SqlAttempt {
            id: SqlAttempt::deterministic_id(run_id, attempt_number),
            created_at: now,
            updated_at: now,
            run_id: run_id.to_string(),
            attempt_number,
            sql: sql.to_string(),
            error: error.map(str::to_string),
        };
        if let Err(err) = self.bookkeeping.store_item(attempt).await {
            warn!(error = %err, run_id = %run_id, "failed to persist sql attempt");
        }
    }
}

/// Matches `dash/personal/orchestrator.py::_missing_evidence_hints`.
fn missing_evidence_hints(request: &AskRequest) -> Vec<String> {
    let mut hints = vec![
        "Try source filters: gmail, slack, imessage, files".to_string(),
        "Try a tighter time range (last 7d or 30d)".to_string(),
    ];
    if !request.source_filters.is_empty() {
        hints.push("Current source filter may be too narrow".to_string());
    }
    if request.time_from.is_some() || request.time_to.is_some() {
        hints.push("Current date range may exclude relevant evidence".to_string());
    }
    hints
}

/// Ports `dash/native/insights.py::summarize_rows`'s deterministic fallback.
fn deterministic_row_summary(question: &str, rows: &[Map<String, Value>]) -> String {
    if rows.is_empty() {
        return "No matching rows were found.".to_string();
    }
    let first = &rows[0];
    if rows.len() == 1 {
        let parts: Vec<String> = first.iter().take(4).map(|(k, v)| format!("{k}={v}")).collect();
        return format!("Answer for '{question}': {}", parts.join(", "));
    }
    let preview: Vec<String> = first.iter().take(3).map(|(k, v)| format!("{k}={v}")).collect();
    format!("Found {} rows. Top result: {}", rows.len(), preview.join(", "))
}

fn memory_hints(used: &[MemoryItem]) -> Vec<String> {
    used.iter().take(2).map(|m| first_line(&m.statement, 200)).collect()
}

fn first_line(text: &str, max_chars: usize) -> String {
    text.lines().next().unwrap_or("").chars().take(max_chars).collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn combine_errors(structured: Option<&str>, evidence: Option<&str>) -> Option<String> {
    match (structured, evidence) {
        (Some(a), Some(b)) => Some(format!("structured path: {a}; evidence path: {b}")),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_summary_matches_reference_shape() {
        let mut row = Map::new();
        row.insert("name".to_string(), Value::String("Lewis".to_string()));
        let summary = deterministic_row_summary("who is lewis", &[row]);
        assert!(summary.starts_with("Answer for 'who is lewis':"));
    }

    #[test]
    fn multi_row_summary_reports_count() {
        let mut row_a = Map::new();
        row_a.insert("count".to_string(), Value::from(3));
        let mut row_b = Map::new();
        row_b.insert("count".to_string(), Value::from(5));
        let summary = deterministic_row_summary("totals", &[row_a, row_b]);
        assert!(summary.starts_with("Found 2 rows."));
    }

    #[test]
    fn empty_rows_yield_no_match_message() {
        assert_eq!(deterministic_row_summary("anything", &[]), "No matching rows were found.");
    }

    #[test]
    fn missing_evidence_hints_include_filter_reason_when_filters_present() {
        let mut request = AskRequest::default();
        request.source_filters = vec!["gmail".to_string()];
        let hints = missing_evidence_hints(&request);
        assert!(hints.iter().any(|h| h.contains("too narrow")));
    }
}
