// HTTP routes configuration

use crate::core::state::AppState;
use crate::handlers::{announce, fallback, health, scrape, stats};
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Tracker endpoints
        .route("/announce", get(announce::announce_handler))
        .route("/scrape", get(scrape::scrape_handler))

        // Monitoring
        .route("/health", get(health::health_handler))
        .route("/stats", get(stats::stats_handler))

        .fallback(fallback::fallback_handler)

        .with_state(state)
}
