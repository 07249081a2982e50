// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::sink::Aggregator;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) aggregator: Arc<Aggregator>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
    pub(crate) config: AppConfig,
}

pub fn app(aggregator: Arc<Aggregator>, ws_connections: Arc<AtomicUsize>, config: AppConfig) -> Router {
    let state = AppState {
        aggregator,
        ws_connections,
        config,
    };
    Router::new()
        .route("/", get(|| async { "iostats agent" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/checks", get(http::checks_handler)) // GET /api/checks
        .route("/api/metrics", get(http::metrics_handler)) // GET /api/metrics
        .route("/api/metrics/{check_id}", get(http::check_metrics_handler)) // GET /api/metrics/{check_id}
        .route("/ws/metrics", get(ws::ws_metrics)) // WS /ws/metrics
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
