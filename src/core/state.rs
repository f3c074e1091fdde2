// Application state (AppState)

use crate::backup::{self, Backup};
use crate::core::config::Config;
use crate::core::error::BackupError;
use crate::metrics::collector::Metrics;
use crate::stores::{connection_cache::ConnectionCache, peer_store::PeerStore};
use crate::udp::server::UdpTracker;
use std::sync::Arc;

/// Shared application state
///
/// One instance backs both transports: the HTTP router holds it directly and
/// the UDP tracker is built from the same stores.
#[derive(Clone)]
pub struct AppState {
    /// Swarm membership
    pub peer_store: Arc<PeerStore>,

    /// UDP connection ids by source address
    pub connections: Arc<ConnectionCache>,

    pub metrics: Arc<Metrics>,

    /// Snapshot backend bound to `peer_store`
    pub backup: Arc<dyn Backup>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, BackupError> {
        let peer_store = Arc::new(PeerStore::new(
            config.peers.list_pool_capacity,
            config.tracker.max_numwant,
        ));
        let backup = backup::from_config(&config.backup, Arc::clone(&peer_store))?;

        Ok(Self {
            peer_store,
            connections: Arc::new(ConnectionCache::new(config.connections.max_age)),
            metrics: Arc::new(Metrics::new()),
            backup,
            config: Arc::new(config),
        })
    }

    /// Build the UDP state machine over the shared stores.
    pub fn udp_tracker(&self) -> UdpTracker {
        UdpTracker::new(
            self.config.tracker.clone(),
            self.config.udp.validate_connection_id,
            Arc::clone(&self.peer_store),
            Arc::clone(&self.connections),
            Arc::clone(&self.metrics),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::peer::Peer;
    use crate::udp::protocol::ConnectRequest;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_state_shares_stores_with_udp_tracker() {
        let state = AppState::new(Config::default()).unwrap();
        let tracker = state.udp_tracker();

        let mut request = Vec::new();
        ConnectRequest { transaction_id: 7 }.encode(&mut request).unwrap();

        let mut reply = Vec::new();
        tracker.process(&request, SocketAddr::from(([127, 0, 0, 1], 6881)), &mut reply);

        assert_eq!(reply.len(), 16);
        assert_eq!(state.connections.len(), 1);
        assert_eq!(state.metrics.udp_connects.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_state_backup_bound_to_store() {
        let state = AppState::new(Config::default()).unwrap();

        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        state.peer_store.save([1u8; 20], [2u8; 20], Peer::new(ip, 6881, false, 1000));
        state.backup.save().unwrap();

        state.peer_store.drop_peer(&[1u8; 20], &[2u8; 20]);
        assert_eq!(state.peer_store.total_peers(), 0);

        assert_eq!(state.backup.load().unwrap(), 1);
        assert_eq!(state.peer_store.total_peers(), 1);
    }
}
