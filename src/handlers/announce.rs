use crate::bencode::response::{build_announce_response, PeerList};
use crate::core::error::AnnounceError;
use crate::core::state::AppState;
use crate::models::event::SwarmTransition;
use crate::models::peer::{IpFamily, Peer};
use crate::utils::time::current_timestamp;
use crate::validation::params::AnnounceParams;
use axum::{
    extract::{ConnectInfo, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Announce handler
///
/// GET /announce
///
/// Same swarm semantics as a UDP announce. The peer's address is always the
/// connection source; any `ip` parameter is ignored.
#[instrument(skip(state, raw_query))]
pub async fn announce_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Response, AnnounceError> {
    let query = raw_query.ok_or_else(|| {
        debug!("Missing query string - browser access");
        state.metrics.increment_http_failures();
        AnnounceError::BrowserAccess
    })?;

    let params = AnnounceParams::parse(&query).map_err(|e| {
        debug!(error = %e, "Parameter validation failed");
        state.metrics.increment_http_failures();
        e
    })?;

    state.metrics.increment_http_announces();

    let ip = addr.ip().to_canonical();
    let family = IpFamily::of(&ip);
    let interval = state.config.tracker.jittered_interval();

    debug!(
        info_hash = %hex::encode(params.info_hash),
        peer_id = %hex::encode(params.peer_id),
        ip = %ip,
        port = params.port,
        uploaded = params.uploaded,
        downloaded = params.downloaded,
        left = params.left,
        event = ?params.event,
        "Validated announce parameters"
    );

    let body = match params.event.transition(params.left) {
        SwarmTransition::Leave => {
            state.peer_store.drop_peer(&params.info_hash, &params.peer_id);

            let peers = if params.compact {
                PeerList::Compact { family, bytes: &[] }
            } else {
                PeerList::Dict {
                    peers: &[],
                    include_peer_id: !params.no_peer_id,
                }
            };
            build_announce_response(0, 0, interval, peers)
        }
        SwarmTransition::Upsert { complete } => {
            let peer = Peer::new(ip, params.port, complete, current_timestamp());
            state.peer_store.save(params.info_hash, params.peer_id, peer);

            let (seeders, leechers) = state.peer_store.hash_stats(&params.info_hash);
            let numwant = state.config.tracker.clamp_numwant(params.numwant);

            if params.compact {
                let bytes = state.peer_store.peer_list_bytes(&params.info_hash, numwant, family);
                build_announce_response(seeders, leechers, interval, PeerList::Compact { family, bytes: &bytes })
            } else {
                let peers = state
                    .peer_store
                    .peer_list(&params.info_hash, numwant, Some(&params.peer_id));
                build_announce_response(
                    seeders,
                    leechers,
                    interval,
                    PeerList::Dict {
                        peers: &peers,
                        include_peer_id: !params.no_peer_id,
                    },
                )
            }
        }
    };

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use axum::{body::Body, http::Request, routing::get, Router};
    use http_body_util::BodyExt;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use tower::ServiceExt;

    const HASH: &str = "aaaaaaaaaaaaaaaaaaaa";

    fn create_test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.tracker.announce_fuzz = 0;
        Arc::new(AppState::new(config).unwrap())
    }

    async fn announce(state: &Arc<AppState>, query: &str, remote: SocketAddr) -> Vec<u8> {
        let app = Router::new()
            .route("/announce", get(announce_handler))
            .with_state(Arc::clone(state));

        let uri = if query.is_empty() {
            "/announce".to_string()
        } else {
            format!("/announce?{}", query)
        };
        let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(remote));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    fn v4(last: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), 40000)
    }

    fn query(peer_id: &str, port: u16, left: i64, extra: &str) -> String {
        format!(
            "info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}{}",
            HASH, peer_id, port, left, extra
        )
    }

    #[tokio::test]
    async fn test_announce_compact_includes_swarm() {
        let state = create_test_state();

        announce(&state, &query("peer-aaaaaaaaaaaaaaa", 6881, 0, ""), v4(1)).await;
        let body = announce(&state, &query("peer-bbbbbbbbbbbbbbb", 6882, 100, ""), v4(2)).await;

        let prefix = b"d8:completei1e10:incompletei1e8:intervali1800e5:peers12:".as_slice();
        let prefix_len = prefix.len();
        assert!(body.starts_with(prefix));
        assert_eq!(body.len(), prefix_len + 12 + 1);

        let mut entries: Vec<&[u8]> = body[prefix_len..prefix_len + 12].chunks(6).collect();
        entries.sort();
        assert_eq!(entries[0], &[10, 0, 0, 1, 0x1a, 0xe1]);
        assert_eq!(entries[1], &[10, 0, 0, 2, 0x1a, 0xe2]);
    }

    #[tokio::test]
    async fn test_announce_non_compact_excludes_requester() {
        let state = create_test_state();

        announce(&state, &query("peer-aaaaaaaaaaaaaaa", 6881, 0, ""), v4(1)).await;
        let body = announce(&state, &query("peer-bbbbbbbbbbbbbbb", 6882, 100, "&compact=0"), v4(2)).await;
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("d2:ip8:10.0.0.17:peer id20:peer-aaaaaaaaaaaaaaa4:porti6881ee"));
        assert!(!text.contains("peer-bbbbbbbbbbbbbbb"));

        let body = announce(
            &state,
            &query("peer-bbbbbbbbbbbbbbb", 6882, 100, "&compact=0&no_peer_id=1"),
            v4(2),
        )
        .await;
        assert!(!String::from_utf8_lossy(&body).contains("peer id"));
    }

    #[tokio::test]
    async fn test_announce_ipv6_uses_peers6() {
        let state = create_test_state();
        let remote = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 40000);

        announce(&state, &query("peer-aaaaaaaaaaaaaaa", 6881, 0, ""), v4(1)).await;
        let body = announce(&state, &query("peer-bbbbbbbbbbbbbbb", 6882, 100, ""), remote).await;

        let mut expected = b"d8:completei1e10:incompletei1e8:intervali1800e5:peers0:6:peers618:".to_vec();
        expected.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        expected.extend_from_slice(&6882u16.to_be_bytes());
        expected.push(b'e');
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn test_announce_mapped_ipv4_is_canonicalised() {
        let state = create_test_state();
        let mapped = SocketAddr::new(IpAddr::V6(Ipv4Addr::new(10, 0, 0, 9).to_ipv6_mapped()), 40000);

        let body = announce(&state, &query("peer-aaaaaaaaaaaaaaa", 6881, 0, ""), mapped).await;

        let mut expected = b"d8:completei1e10:incompletei0e8:intervali1800e5:peers6:".to_vec();
        expected.extend_from_slice(&[10, 0, 0, 9, 0x1a, 0xe1]);
        expected.push(b'e');
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn test_announce_stopped_removes_peer() {
        let state = create_test_state();

        announce(&state, &query("peer-aaaaaaaaaaaaaaa", 6881, 0, ""), v4(1)).await;
        let body = announce(&state, &query("peer-aaaaaaaaaaaaaaa", 6881, 0, "&event=stopped"), v4(1)).await;

        assert_eq!(body, b"d8:completei0e10:incompletei0e8:intervali1800e5:peers0:e");
        assert_eq!(state.peer_store.total_peers(), 0);
    }

    #[tokio::test]
    async fn test_announce_completed_marks_seeder() {
        let state = create_test_state();

        announce(&state, &query("peer-aaaaaaaaaaaaaaa", 6881, 500, "&event=completed"), v4(1)).await;
        assert_eq!(state.peer_store.hash_stats(&[b'a'; 20]), (1, 0));
    }

    #[tokio::test]
    async fn test_announce_validation_failure() {
        let state = create_test_state();

        let body = announce(&state, &query("short", 6881, 0, ""), v4(1)).await;
        assert_eq!(body, b"d14:failure reason15:invalid peer ide");

        let body = announce(&state, &query("peer-aaaaaaaaaaaaaaa", 0, 0, ""), v4(1)).await;
        assert_eq!(body, b"d14:failure reason12:invalid porte");

        assert_eq!(state.peer_store.total_peers(), 0);
        assert_eq!(state.metrics.http_failures.load(std::sync::atomic::Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_announce_without_query() {
        let state = create_test_state();

        let body = announce(&state, "", v4(1)).await;
        assert!(String::from_utf8_lossy(&body).starts_with("d14:failure reason"));
    }
}
