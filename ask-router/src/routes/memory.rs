use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use common::error::AppError;
use common::storage::types::memory_candidate::{CandidateStatus, MemoryCandidate};
use common::storage::types::memory_item::MemoryItem;

use crate::{api_state::ApiState, error::ApiError};

/// `GET /v1/memory/candidates`: proposed candidates awaiting human review.
pub async fn list_candidates(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let candidates: Vec<MemoryCandidate> = state
        .db
        .get_all_stored_items::<MemoryCandidate>()
        .await
        .map_err(AppError::from)?
        .into_iter()
        .filter(|c| matches!(c.status, CandidateStatus::Proposed))
        .collect();
    Ok(Json(candidates))
}

/// `GET /v1/memory/items`: currently active memory items.
pub async fn list_active_items(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let items: Vec<MemoryItem> = state
        .db
        .get_all_stored_items::<MemoryItem>()
        .await
        .map_err(AppError::from)?
        .into_iter()
        .filter(MemoryItem::is_active)
        .collect();
    Ok(Json(items))
}

/// `POST /v1/memory/candidates/{id}/approve`.
pub async fn approve_candidate(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (item, demoted) = state.memory.approve_candidate(&id).await?;
    Ok(Json(serde_json::json!({ "item": item, "demoted": demoted })))
}

/// `POST /v1/memory/candidates/{id}/reject`.
pub async fn reject_candidate(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.memory.reject_candidate(&id).await?;
    Ok(Json(serde_json::json!({ "status": "rejected" })))
}

/// `POST /v1/memory/items/{id}/deprecate`.
pub async fn deprecate_item(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.memory.deprecate_item(&id).await?;
    Ok(Json(serde_json::json!({ "status": "deprecated" })))
}
