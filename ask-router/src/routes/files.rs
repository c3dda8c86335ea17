use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use common::error::AppError;
use common::storage::types::file_allowlist::{validate_paths, FileAllowlist};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

const ALLOWLIST_ID: &str = "singleton";

/// `GET /v1/files/allowlist`.
pub async fn get_allowlist(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let allowlist = state
        .db
        .get_item::<FileAllowlist>(ALLOWLIST_ID)
        .await
        .map_err(AppError::from)?;
    let paths = allowlist.map(|a| a.paths).unwrap_or_default();
    Ok(Json(serde_json::json!({ "paths": paths })))
}

#[derive(Debug, Deserialize)]
pub struct AllowlistBody {
    pub paths: Vec<String>,
}

/// `POST /v1/files/allowlist`: replace-all semantics.
pub async fn set_allowlist(
    State(state): State<ApiState>,
    Json(body): Json<AllowlistBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_paths(&body.paths).map_err(ApiError::ValidationError)?;

    let existing = state
        .db
        .get_item::<FileAllowlist>(ALLOWLIST_ID)
        .await
        .map_err(AppError::from)?;
    let now = Utc::now();
    let allowlist = FileAllowlist {
        id: ALLOWLIST_ID.to_string(),
        created_at: existing.map(|a| a.created_at).unwrap_or(now),
        updated_at: now,
        paths: body.paths.clone(),
    };

    if state
        .db
        .update_item(ALLOWLIST_ID, allowlist.clone())
        .await
        .map_err(AppError::from)?
        .is_none()
    {
        state.db.store_item(allowlist).await.map_err(AppError::from)?;
    }

    Ok(Json(serde_json::json!({ "accepted": true, "paths": body.paths })))
}
