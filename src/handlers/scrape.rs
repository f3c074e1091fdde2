use crate::bencode::response::build_scrape_response;
use crate::core::error::AnnounceError;
use crate::core::state::AppState;
use crate::validation::params::ScrapeParams;
use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Scrape handler
///
/// GET /scrape
#[instrument(skip_all)]
pub async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, AnnounceError> {
    let params = ScrapeParams::parse(raw_query.as_deref().unwrap_or("")).map_err(|e| {
        debug!(error = %e, "Scrape validation failed");
        state.metrics.increment_http_failures();
        e
    })?;

    state.metrics.increment_http_scrapes();
    debug!(hashes = params.info_hashes.len(), "Processing scrape request");

    let body = build_scrape_response(params.info_hashes.iter().map(|info_hash| {
        let (seeders, leechers) = state.peer_store.hash_stats(info_hash);
        (*info_hash, seeders, leechers)
    }));

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], body).into_response())
}
