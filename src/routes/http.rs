// GET handlers: version, configured checks, latest metric batches

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::AppState;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/checks: configured check instances and their blacklist patterns.
pub(super) async fn checks_handler(State(state): State<AppState>) -> impl IntoResponse {
    let checks: Vec<_> = state
        .config
        .instances
        .iter()
        .map(|i| {
            serde_json::json!({
                "name": i.name,
                "deviceBlacklistRe": i.device_blacklist_re,
            })
        })
        .collect();
    axum::Json(checks)
}

/// GET /api/metrics: latest committed batch of every check.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.aggregator.latest_all())
}

/// GET /api/metrics/{check_id}: latest committed batch of one check; 404 before its first commit.
pub(super) async fn check_metrics_handler(
    State(state): State<AppState>,
    Path(check_id): Path<String>,
) -> impl IntoResponse {
    match state.aggregator.latest(&check_id) {
        Some(batch) => axum::Json(batch).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "error": format!("no metrics for check '{}'", check_id) })),
        )
            .into_response(),
    }
}
