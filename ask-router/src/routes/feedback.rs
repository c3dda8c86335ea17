use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use common::storage::types::citation::Citation;
use common::storage::types::feedback_event::{FeedbackEvent, Verdict};
use common::storage::types::memory_candidate::{CandidateStatus, MemoryCandidate};
use common::storage::types::query_run::QueryRun;
use memory_lifecycle::ReflectionEngine;
use serde::Deserialize;
use uuid::Uuid;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub run_id: String,
    pub verdict: Verdict,
    pub comment: Option<String>,
    pub corrected_answer: Option<String>,
    pub corrected_sql: Option<String>,
    #[serde(default)]
    pub corrected_filters: Vec<String>,
    pub corrected_source_scope: Option<String>,
}

/// `POST /v1/feedback`. Grounded on `original_source/dash/personal/router.py`'s
/// feedback endpoint: persists the event, looks up the run's first five
/// citations as evidence, and writes any non-empty-evidence reflection draft
/// as a proposed memory candidate.
pub async fn feedback(
    State(state): State<ApiState>,
    Json(body): Json<FeedbackBody>,
) -> Result<impl IntoResponse, ApiError> {
    let run = state
        .db
        .get_item::<QueryRun>(&body.run_id)
        .await
        .map_err(common::error::AppError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("query run {} not found", body.run_id)))?;

    let now = Utc::now();
    let event = FeedbackEvent {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
        run_id: body.run_id.clone(),
        verdict: body.verdict,
        comment: body.comment.clone(),
        corrected_answer: body.corrected_answer.clone(),
        corrected_sql: body.corrected_sql.clone(),
        corrected_filters: body.corrected_filters.clone(),
        corrected_source_scope: body.corrected_source_scope.clone(),
    };
    state
        .db
        .store_item(event)
        .await
        .map_err(common::error::AppError::from)?;

    let citations: Vec<Citation> = state
        .db
        .get_all_stored_items::<Citation>()
        .await
        .map_err(common::error::AppError::from)?
        .into_iter()
        .filter(|c| c.run_id == body.run_id)
        .take(5)
        .collect();
    let citation_ids: Vec<String> = citations.iter().map(|c| c.id.clone()).collect();

    let reflection = ReflectionEngine::new();
    let mut drafts = reflection.from_feedback(
        matches!(body.verdict, Verdict::Incorrect),
        body.comment.as_deref(),
        body.corrected_answer.as_deref(),
        &body.corrected_filters,
        body.corrected_source_scope.as_deref(),
        &citation_ids,
    );
    if let Some(corrected_sql) = &body.corrected_sql {
        drafts.extend(reflection.from_sql_outcome(
            &body.run_id,
            &run.question,
            None,
            None,
            None,
            Some(corrected_sql),
        ));
    }

    persist_drafts(&state, &body.run_id, drafts).await?;

    Ok(Json(serde_json::json!({ "status": "recorded" })))
}

async fn persist_drafts(
    state: &ApiState,
    run_id: &str,
    drafts: Vec<memory_lifecycle::MemoryCandidateDraft>,
) -> Result<(), ApiError> {
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
        state
            .db
            .store_item(candidate)
            .await
            .map_err(common::error::AppError::from)?;
    }
    Ok(())
}
