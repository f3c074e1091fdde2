use crate::stores::connection_cache::ConnectionCache;
use crate::stores::peer_store::PeerStore;
use crate::utils::time::current_timestamp;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    pub udp_hits: AtomicU64,
    pub udp_connects: AtomicU64,
    pub udp_announces: AtomicU64,
    pub udp_scrapes: AtomicU64,
    pub udp_heartbeats: AtomicU64,
    /// Requests answered with a fixed error reply
    pub client_errors: AtomicU64,
    /// Replies that failed to encode and fell back to the hardcoded string
    pub internal_errors: AtomicU64,
    pub http_announces: AtomicU64,
    pub http_scrapes: AtomicU64,
    pub http_failures: AtomicU64,
    pub start_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub udp_hits: u64,
    pub udp_connects: u64,
    pub udp_announces: u64,
    pub udp_scrapes: u64,
    pub udp_heartbeats: u64,
    pub client_errors: u64,
    pub internal_errors: u64,
    pub http_announces: u64,
    pub http_scrapes: u64,
    pub http_failures: u64,
    pub peers: usize,
    pub seeders: usize,
    pub leechers: usize,
    pub swarms: usize,
    pub connections: usize,
    pub uptime_seconds: i64,
    pub requests_per_second: f64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            udp_hits: AtomicU64::new(0),
            udp_connects: AtomicU64::new(0),
            udp_announces: AtomicU64::new(0),
            udp_scrapes: AtomicU64::new(0),
            udp_heartbeats: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            http_announces: AtomicU64::new(0),
            http_scrapes: AtomicU64::new(0),
            http_failures: AtomicU64::new(0),
            start_time: current_timestamp(),
        }
    }

    pub fn increment_udp_hits(&self) {
        bump(&self.udp_hits);
    }

    pub fn increment_udp_connects(&self) {
        bump(&self.udp_connects);
    }

    pub fn increment_udp_announces(&self) {
        bump(&self.udp_announces);
    }

    pub fn increment_udp_scrapes(&self) {
        bump(&self.udp_scrapes);
    }

    pub fn increment_udp_heartbeats(&self) {
        bump(&self.udp_heartbeats);
    }

    pub fn increment_client_errors(&self) {
        bump(&self.client_errors);
    }

    pub fn increment_internal_errors(&self) {
        bump(&self.internal_errors);
    }

    pub fn increment_http_announces(&self) {
        bump(&self.http_announces);
    }

    pub fn increment_http_scrapes(&self) {
        bump(&self.http_scrapes);
    }

    pub fn increment_http_failures(&self) {
        bump(&self.http_failures);
    }

    /// Combine the counters with live store sizes. requests_per_second covers
    /// every UDP datagram and HTTP announce/scrape since start.
    pub fn get_snapshot(&self, peer_store: &PeerStore, connections: &ConnectionCache) -> MetricsSnapshot {
        let udp_hits = self.udp_hits.load(Ordering::Relaxed);
        let http_announces = self.http_announces.load(Ordering::Relaxed);
        let http_scrapes = self.http_scrapes.load(Ordering::Relaxed);

        let uptime_seconds = current_timestamp() - self.start_time;
        let total_requests = udp_hits + http_announces + http_scrapes;

        let requests_per_second = if uptime_seconds > 0 {
            total_requests as f64 / uptime_seconds as f64
        } else {
            0.0
        };

        let peers = peer_store.total_peers();
        let seeders = peer_store.total_seeders();

        MetricsSnapshot {
            udp_hits,
            udp_connects: self.udp_connects.load(Ordering::Relaxed),
            udp_announces: self.udp_announces.load(Ordering::Relaxed),
            udp_scrapes: self.udp_scrapes.load(Ordering::Relaxed),
            udp_heartbeats: self.udp_heartbeats.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            http_announces,
            http_scrapes,
            http_failures: self.http_failures.load(Ordering::Relaxed),
            peers,
            seeders,
            leechers: peers.saturating_sub(seeders),
            swarms: peer_store.active_swarms(),
            connections: connections.len(),
            uptime_seconds,
            requests_per_second,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::peer::Peer;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    #[test]
    fn test_new_metrics() {
        let metrics = Metrics::new();

        assert_eq!(metrics.udp_hits.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.http_failures.load(Ordering::Relaxed), 0);
        assert!(metrics.start_time > 0);
    }

    #[test]
    fn test_increment_counters() {
        let metrics = Metrics::new();

        metrics.increment_udp_hits();
        metrics.increment_udp_hits();
        metrics.increment_udp_announces();
        metrics.increment_client_errors();
        metrics.increment_http_scrapes();

        assert_eq!(metrics.udp_hits.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.udp_announces.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.client_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.http_scrapes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_snapshot_includes_store_sizes() {
        let metrics = Metrics::new();
        let peer_store = PeerStore::new(4, 50);
        let connections = ConnectionCache::new(120);

        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        peer_store.save([1u8; 20], [1u8; 20], Peer::new(ip, 6881, true, 1000));
        peer_store.save([1u8; 20], [2u8; 20], Peer::new(ip, 6882, false, 1000));
        peer_store.save([2u8; 20], [3u8; 20], Peer::new(ip, 6883, false, 1000));
        connections.create(SocketAddr::new(ip, 6881), 1000);

        metrics.increment_udp_hits();

        let snapshot = metrics.get_snapshot(&peer_store, &connections);
        assert_eq!(snapshot.udp_hits, 1);
        assert_eq!(snapshot.peers, 3);
        assert_eq!(snapshot.seeders, 1);
        assert_eq!(snapshot.leechers, 2);
        assert_eq!(snapshot.swarms, 2);
        assert_eq!(snapshot.connections, 1);
        assert!(snapshot.uptime_seconds >= 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = Metrics::new();
        let snapshot = metrics.get_snapshot(&PeerStore::new(1, 1), &ConnectionCache::new(1));

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"udp_hits\":0"));
        assert!(json.contains("\"requests_per_second\""));
    }
}
