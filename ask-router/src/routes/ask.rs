use axum::{extract::State, response::IntoResponse, Json};
use ask_orchestrator::AskRequest;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

const MAX_QUESTION_CHARS: usize = 3000;

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub include_debug: bool,
    #[serde(default)]
    pub source_filters: Vec<String>,
    pub time_from: Option<DateTime<Utc>>,
    pub time_to: Option<DateTime<Utc>>,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_max_sql_attempts")]
    pub max_sql_attempts: u32,
}

fn default_top_k() -> i64 {
    8
}

fn default_max_sql_attempts() -> u32 {
    2
}

/// `POST /v1/ask`.
pub async fn ask(State(state): State<ApiState>, Json(body): Json<AskBody>) -> Result<impl IntoResponse, ApiError> {
    if body.question.trim().is_empty() {
        return Err(ApiError::ValidationError("question must not be empty".to_string()));
    }
    if body.question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::ValidationError(format!(
            "question must be at most {MAX_QUESTION_CHARS} characters"
        )));
    }
    if !(1..=100).contains(&body.top_k) {
        return Err(ApiError::ValidationError("top_k must be between 1 and 100".to_string()));
    }
    let attempts_ceiling = state.config.guardrails.max_sql_attempts;
    if body.max_sql_attempts < 1 || body.max_sql_attempts > attempts_ceiling {
        return Err(ApiError::ValidationError(format!(
            "max_sql_attempts must be between 1 and {attempts_ceiling}"
        )));
    }

    let request = AskRequest {
        question: body.question,
        user_id: body.user_id,
        session_id: body.session_id,
        include_debug: body.include_debug,
        source_filters: body.source_filters,
        time_from: body.time_from,
        time_to: body.time_to,
        top_k: body.top_k,
        max_sql_attempts: body.max_sql_attempts,
    };

    let response = state.orchestrator.run_ask(request, None).await;
    Ok(Json(response))
}
