use crate::core::state::AppState;
use crate::utils::time::current_timestamp;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub udp_enabled: bool,
    pub http_enabled: bool,
    /// Info hashes with at least one live peer
    pub swarms: usize,
    pub peers: usize,
    /// Outstanding UDP connection ids
    pub connections: usize,
}

/// Health check handler
///
/// GET /health
///
/// Reports which transports are configured and the current store sizes.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: current_timestamp(),
            udp_enabled: state.config.udp.enabled,
            http_enabled: state.config.http.enabled,
            swarms: state.peer_store.active_swarms(),
            peers: state.peer_store.total_peers(),
            connections: state.connections.len(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::models::peer::Peer;
    use http_body_util::BodyExt;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    async fn fetch_health(state: Arc<AppState>) -> HealthResponse {
        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_empty_tracker() {
        let state = Arc::new(AppState::new(Config::default()).unwrap());
        let health = fetch_health(state).await;

        assert_eq!(health.status, "ok");
        assert!(health.timestamp > 0);
        assert_eq!(health.swarms, 0);
        assert_eq!(health.peers, 0);
        assert_eq!(health.connections, 0);
    }

    #[tokio::test]
    async fn test_health_reports_transports_and_store_sizes() {
        let mut config = Config::default();
        config.udp.enabled = false;
        config.http.enabled = true;
        let state = Arc::new(AppState::new(config).unwrap());

        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        state.peer_store.save([1u8; 20], [1u8; 20], Peer::new(ip, 6881, true, 1000));
        state.peer_store.save([1u8; 20], [2u8; 20], Peer::new(ip, 6882, false, 1000));
        state.peer_store.save([2u8; 20], [3u8; 20], Peer::new(ip, 6883, false, 1000));
        state.connections.create(SocketAddr::new(ip, 51413), current_timestamp());

        let health = fetch_health(state).await;

        assert!(!health.udp_enabled);
        assert!(health.http_enabled);
        assert_eq!(health.swarms, 2);
        assert_eq!(health.peers, 3);
        assert_eq!(health.connections, 1);
    }
}
