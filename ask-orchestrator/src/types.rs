//! Ask contract types (§6), independent of the transport that carries them
//! so `ask-router` can (de)serialize them without depending on orchestrator
//! internals beyond these shapes.

use chrono::{DateTime, Utc};
use common::storage::types::query_run::{OutcomeClass, RunMode, RunStatus};
use serde::{Deserialize, Serialize};

use crate::router::RouteDecision;

#[derive(Debug, Clone)]
pub struct AskRequest {
    pub question: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub include_debug: bool,
    pub source_filters: Vec<String>,
    pub time_from: Option<DateTime<Utc>>,
    pub time_to: Option<DateTime<Utc>>,
    pub top_k: i64,
    pub max_sql_attempts: u32,
}

impl Default for AskRequest {
    fn default() -> Self {
        Self {
            question: String::new(),
            user_id: None,
            session_id: None,
            include_debug: false,
            source_filters: Vec::new(),
            time_from: None,
            time_to: None,
            top_k: 8,
            max_sql_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationView {
    pub citation_id: String,
    pub source: String,
    pub title: Option<String>,
    pub snippet: String,
    pub author: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub deep_link: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlAttemptView {
    pub attempt_number: u32,
    pub sql: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskDebug {
    pub memory_used: Vec<String>,
    pub memory_skipped: Vec<String>,
    pub sql_attempts: Vec<SqlAttemptView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub mode: Option<RunMode>,
    pub answer: Option<String>,
    pub sql: Option<String>,
    pub rows: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
    pub citations: Vec<CitationView>,
    pub missing_evidence: Vec<String>,
    pub memory_used: Vec<String>,
    pub error: Option<String>,
    pub debug: Option<AskDebug>,
    pub created_at: DateTime<Utc>,
}

impl AskResponse {
    pub(crate) fn failed(run_id: String, error: String) -> Self {
        Self {
            run_id,
            status: RunStatus::Failed,
            mode: None,
            answer: None,
            sql: None,
            rows: None,
            citations: Vec::new(),
            missing_evidence: Vec::new(),
            memory_used: Vec::new(),
            error: Some(error),
            debug: None,
            created_at: Utc::now(),
        }
    }
}

pub(crate) fn run_mode_from_route(route: RouteDecision) -> RunMode {
    match route {
        RouteDecision::Structured => RunMode::Structured,
        RouteDecision::Evidence => RunMode::Evidence,
        RouteDecision::Both => RunMode::Both,
    }
}

pub fn outcome_label(outcome: OutcomeClass) -> &'static str {
    match outcome {
        OutcomeClass::Success => "success",
        OutcomeClass::Partial => "partial",
        OutcomeClass::Failure => "failure",
        OutcomeClass::HallucinationRisk => "hallucination-risk",
    }
}
