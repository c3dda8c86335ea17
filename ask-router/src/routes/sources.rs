use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use common::error::AppError;
use common::storage::types::source_state::SourceState;
use ingestion::connectors::SourceConnector;
use serde::Deserialize;
use serde_json::Value;

use crate::{api_state::ApiState, error::ApiError};

/// `GET /v1/sources`.
pub async fn list_sources(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let sources = state
        .db
        .get_all_stored_items::<SourceState>()
        .await
        .map_err(AppError::from)?;
    Ok(Json(sources))
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    #[serde(default)]
    pub full: bool,
    #[serde(default)]
    pub seed_cursor: Option<Value>,
}

/// `POST /v1/sources/{source}/sync`.
pub async fn sync_source(
    State(state): State<ApiState>,
    Path(source): Path<String>,
    Json(body): Json<SyncBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut connector = state
        .connector_for(&source)
        .ok_or_else(|| ApiError::NotFound(format!("unknown source {source}")))?;

    connector
        .connect(body.seed_cursor)
        .await
        .map_err(ApiError::from)?;

    let report = state
        .coordinator
        .run_sync(connector.as_mut(), body.full)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(serde_json::json!({
        "source": report.source,
        "accepted": true,
        "synced_documents": report.documents_created,
        "synced_chunks": report.chunks_created,
        "message": report.message,
    })))
}
