// Stats endpoint

use crate::core::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

/// Returns JSON with request counters, swarm and connection totals, uptime
/// and requests per second.
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.metrics.get_snapshot(&state.peer_store, &state.connections);

    (StatusCode::OK, Json(snapshot)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::metrics::collector::MetricsSnapshot;
    use crate::models::peer::Peer;
    use http_body_util::BodyExt;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn test_stats_handler() {
        let state = Arc::new(AppState::new(Config::default()).unwrap());
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        state.peer_store.save([1u8; 20], [1u8; 20], Peer::new(ip, 6881, true, 1000));
        state.metrics.increment_http_announces();

        let response = stats_handler(State(Arc::clone(&state))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let snapshot: MetricsSnapshot = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(snapshot.http_announces, 1);
        assert_eq!(snapshot.peers, 1);
        assert_eq!(snapshot.seeders, 1);
        assert_eq!(snapshot.swarms, 1);
    }
}
