//! End-to-end scenarios seeded straight from the testable-properties list:
//! S1/S2 exercise the guardrail in isolation, S3/S4 drive a full
//! `AskOrchestrator::run_ask` in evidence mode against a real corpus store,
//! S5/S6 drive `MemoryManager`'s approve/reject lifecycle.

use std::sync::Arc;

use ask_orchestrator::{AskOrchestrator, AskRequest, IntentRouter, RouteDecision, SqlDrafter};
use chrono::Utc;
use common::oracle::embedding::HashedEmbeddingOracle;
use common::oracle::EmbeddingOracle;
use common::oracle::TextOracle;
use common::storage::types::memory_candidate::{CandidateStatus, MemoryCandidate, MemoryKind, MemoryScope};
use common::storage::types::memory_item::{ActivationState, MemoryItem};
use corpus_store::guardrail::{self, GuardrailConfig, GuardrailError};
use corpus_store::model::DocumentPayload;
use corpus_store::{CorpusStore, SqlExecutor};
use memory_lifecycle::MemoryManager;
use retrieval::HybridRetriever;
use sqlx::PgPool;
use uuid::Uuid;

mod test_utils;
use test_utils::{setup_bookkeeping, ErroringOracle};

// S1. Guardrail strips LIMIT default.
#[test]
fn s1_guardrail_strips_limit_default() {
    let normalized = guardrail::validate_and_normalize_sql("SELECT 1 AS x", &GuardrailConfig::default()).unwrap();
    assert_eq!(normalized, "SELECT 1 AS x\nLIMIT 50");
}

// S2. Guardrail rejects second statement.
#[test]
fn s2_guardrail_rejects_second_statement() {
    let err = guardrail::validate_and_normalize_sql("SELECT 1; SELECT 2", &GuardrailConfig::default());
    assert!(matches!(err, Err(GuardrailError::MultipleStatements)));
    assert_eq!(
        err.unwrap_err().to_string(),
        "Only one SQL statement is allowed per request.",
    );
}

async fn build_orchestrator(pool: PgPool) -> AskOrchestrator {
    let corpus = Arc::new(CorpusStore::from_pool(pool).await.expect("schema bootstrap failed"));
    let bookkeeping = setup_bookkeeping().await;
    let embedder: Arc<dyn EmbeddingOracle> = Arc::new(HashedEmbeddingOracle::new(384));
    let retriever = Arc::new(HybridRetriever::new(corpus.clone(), embedder));
    let memory = Arc::new(MemoryManager::new(bookkeeping.clone()));
    let oracle: Arc<dyn TextOracle> = Arc::new(ErroringOracle);
    let sql_executor = SqlExecutor::new(corpus.pool().clone(), 5_000);

    AskOrchestrator::new(
        bookkeeping,
        retriever,
        memory,
        IntentRouter::new(oracle.clone()),
        SqlDrafter::new(oracle.clone()),
        sql_executor,
        GuardrailConfig::default(),
        oracle,
    )
}

// S3. Insufficient evidence against an empty corpus.
#[sqlx::test]
async fn s3_insufficient_evidence_on_empty_corpus(pool: PgPool) {
    let orchestrator = build_orchestrator(pool).await;
    let request = AskRequest {
        question: "What happened yesterday?".to_string(),
        ..AskRequest::default()
    };

    let response = orchestrator.run_ask(request, Some(RouteDecision::Evidence)).await;

    assert!(matches!(response.status, common::storage::types::query_run::RunStatus::Success));
    assert!(response.citations.is_empty());
    assert!(response.answer.unwrap_or_default().contains("Insufficient evidence"));
    assert!(!response.missing_evidence.is_empty());
}

// S4. Cited answer composed from one matching document.
#[sqlx::test]
async fn s4_cited_answer_composed_from_retrieval(pool: PgPool) {
    let orchestrator = build_orchestrator(pool.clone()).await;
    let corpus = CorpusStore::from_pool(pool).await.expect("schema bootstrap failed");
    let embedder = HashedEmbeddingOracle::new(384);

    let body = "Lewis discussed launch metrics and email quality.";
    let payload = DocumentPayload {
        doc_id: "doc-1".to_string(),
        source: "mail".to_string(),
        external_id: "ext-1".to_string(),
        thread_id: None,
        account_id: None,
        title: Some("Launch recap".to_string()),
        body_text: body.to_string(),
        author: Some("lewis@example.com".to_string()),
        participants: Vec::new(),
        timestamp_utc: Some(Utc::now()),
        deep_link: None,
        metadata: serde_json::json!({}),
        checksum: "checksum-1".to_string(),
    };
    let vector = embedder.encode(body).await.unwrap();
    corpus
        .upsert_document(&payload, &[body.to_string()], &[vector])
        .await
        .expect("seed document failed");

    let request = AskRequest {
        question: "What did Lewis discuss about email quality?".to_string(),
        top_k: 4,
        ..AskRequest::default()
    };
    let response = orchestrator.run_ask(request, Some(RouteDecision::Evidence)).await;

    assert!(matches!(response.status, common::storage::types::query_run::RunStatus::Success));
    assert!(!response.citations.is_empty());
    let answer = response.answer.unwrap_or_default();
    assert!(
        answer.contains("[1]") || answer.contains("Based only on the cited evidence"),
        "unexpected answer: {answer}",
    );
}

fn draft_candidate(learning: &str, confidence: u8) -> MemoryCandidate {
    let now = Utc::now();
    MemoryCandidate {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
        kind: MemoryKind::ReasoningRule,
        scope: MemoryScope::UserGlobal,
        title: learning.to_string(),
        learning: learning.to_string(),
        confidence,
        evidence_citation_ids: vec!["citation-1".to_string()],
        status: CandidateStatus::Proposed,
        metadata: std::collections::BTreeMap::new(),
        run_id: None,
    }
}

fn active_item(statement: &str, confidence: u8) -> MemoryItem {
    let now = Utc::now();
    MemoryItem {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
        kind: MemoryKind::ReasoningRule,
        scope: MemoryScope::UserGlobal,
        statement: statement.to_string(),
        activation_state: ActivationState::Active,
        confidence,
        source: "preloaded".to_string(),
        supersedes_id: None,
        last_verified_at: now,
        expiry_at: None,
        metadata: std::collections::BTreeMap::new(),
    }
}

// S5. Approving a stronger conflicting candidate demotes the weaker item.
#[tokio::test]
async fn s5_conflict_demotion() {
    let bookkeeping = setup_bookkeeping().await;
    let manager = MemoryManager::new(bookkeeping.clone());

    let old_item = active_item("Do not speculate without citations.", 60);
    let old_id = old_item.id.clone();
    bookkeeping.store_item(old_item).await.unwrap();

    let candidate = draft_candidate("Always speculate with citations when uncertain.", 90);
    let candidate_id = candidate.id.clone();
    bookkeeping.store_item(candidate).await.unwrap();

    let (new_item, demoted) = manager.approve_candidate(&candidate_id).await.unwrap();
    assert!(new_item.is_active());
    assert!(demoted.contains(&old_id));

    let old_after: MemoryItem = bookkeeping.get_item(&old_id).await.unwrap().unwrap();
    assert!(matches!(old_after.activation_state, ActivationState::Stale));
    assert_eq!(old_after.supersedes_id, Some(new_item.id));
}

// S6. Approval rejects empty evidence.
#[tokio::test]
async fn s6_approval_rejects_empty_evidence() {
    let bookkeeping = setup_bookkeeping().await;
    let manager = MemoryManager::new(bookkeeping.clone());

    let mut candidate = draft_candidate("Prefer terse answers.", 80);
    candidate.evidence_citation_ids = Vec::new();
    let candidate_id = candidate.id.clone();
    bookkeeping.store_item(candidate).await.unwrap();

    let result = manager.approve_candidate(&candidate_id).await;
    assert!(result.is_err());

    let after: MemoryCandidate = bookkeeping.get_item(&candidate_id).await.unwrap().unwrap();
    assert!(matches!(after.status, CandidateStatus::Proposed));
}
