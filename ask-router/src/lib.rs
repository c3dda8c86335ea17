use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    ask::ask,
    feedback::feedback,
    files::{get_allowlist, set_allowlist},
    liveness::live,
    memory::{approve_candidate, deprecate_item, list_active_items, list_candidates, reject_candidate},
    readiness::ready,
    sources::{list_sources, sync_source},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the ask-vault API surface, version 1.
pub fn api_routes_v1<S>(_app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes).
    let public = Router::new().route("/ready", get(ready)).route("/live", get(live));

    let api = Router::new()
        .route("/v1/ask", post(ask))
        .route("/v1/feedback", post(feedback))
        .route("/v1/sources", get(list_sources))
        .route("/v1/sources/{source}/sync", post(sync_source))
        .route("/v1/files/allowlist", get(get_allowlist).post(set_allowlist))
        .route("/v1/memory/candidates", get(list_candidates))
        .route("/v1/memory/candidates/{id}/approve", post(approve_candidate))
        .route("/v1/memory/candidates/{id}/reject", post(reject_candidate))
        .route("/v1/memory/items", get(list_active_items))
        .route("/v1/memory/items/{id}/deprecate", post(deprecate_item));

    public.merge(api)
}
