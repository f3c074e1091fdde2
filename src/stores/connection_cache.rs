use crate::core::error::SnapshotError;
use crate::utils::time::is_expired;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct ConnectionEntry {
    id: i64,
    timestamp: i64,
}

/// Connection ids handed out by the UDP connect exchange, keyed by the
/// client's source address.
pub struct ConnectionCache {
    entries: DashMap<SocketAddr, ConnectionEntry>,
    max_age: i64,
}

fn canonical(addr: SocketAddr) -> SocketAddr {
    SocketAddr::new(addr.ip().to_canonical(), addr.port())
}

impl ConnectionCache {
    pub fn new(max_age: i64) -> Self {
        Self {
            entries: DashMap::new(),
            max_age,
        }
    }

    /// Issue a fresh random id for `addr`, replacing any previous one.
    pub fn create(&self, addr: SocketAddr, now: i64) -> i64 {
        let id = rand::rng().random_range(0..i64::MAX);
        self.entries
            .insert(canonical(addr), ConnectionEntry { id, timestamp: now });
        id
    }

    /// True when `id` is the id last issued to `addr`.
    ///
    /// Age is not checked here. An expired id keeps validating until the next
    /// garbage collection pass evicts it.
    pub fn validate(&self, addr: SocketAddr, id: i64) -> bool {
        self.entries
            .get(&canonical(addr))
            .is_some_and(|entry| entry.id == id)
    }

    /// Evict every entry older than `max_age` seconds. Returns the number evicted.
    pub fn garbage_collect(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !is_expired(entry.timestamp, self.max_age, now));
        let evicted = before.saturating_sub(self.entries.len());

        if evicted > 0 {
            info!(evicted, remaining = self.entries.len(), "Connection cache garbage collected");
        } else {
            debug!(remaining = self.entries.len(), "Connection cache garbage collected, nothing expired");
        }
        evicted
    }

    pub fn marshal(&self) -> Result<Vec<u8>, SnapshotError> {
        let entries: Vec<(SocketAddr, ConnectionEntry)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();

        Ok(rmp_serde::to_vec(&entries)?)
    }

    /// Merge entries from a blob produced by [`ConnectionCache::marshal`] into
    /// the live map. Returns the number of entries read.
    pub fn unmarshal(&self, data: &[u8]) -> Result<usize, SnapshotError> {
        let entries: Vec<(SocketAddr, ConnectionEntry)> = rmp_serde::from_slice(data)?;
        let count = entries.len();

        for (addr, entry) in entries {
            self.entries.insert(canonical(addr), entry);
        }

        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn v4(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn v6(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)), port)
    }

    #[test]
    fn test_create_and_validate_ipv4() {
        let cache = ConnectionCache::new(120);
        let id = cache.create(v4(6881), 1000);

        assert!(id >= 0);
        assert!(cache.validate(v4(6881), id));
        assert!(!cache.validate(v4(6882), id));
        assert!(!cache.validate(v4(6881), id.wrapping_add(1)));
    }

    #[test]
    fn test_create_and_validate_ipv6() {
        let cache = ConnectionCache::new(120);
        let id = cache.create(v6(51413), 1000);

        assert!(cache.validate(v6(51413), id));
        assert!(!cache.validate(v4(51413), id));
    }

    #[test]
    fn test_mapped_ipv4_matches_plain_ipv4() {
        let cache = ConnectionCache::new(120);
        let mapped = SocketAddr::new(IpAddr::V6(Ipv4Addr::new(127, 0, 0, 1).to_ipv6_mapped()), 6881);

        let id = cache.create(mapped, 1000);
        assert!(cache.validate(v4(6881), id));
    }

    #[test]
    fn test_reconnect_replaces_id() {
        let cache = ConnectionCache::new(120);
        let first = cache.create(v4(6881), 1000);
        let mut second = cache.create(v4(6881), 1001);
        while second == first {
            second = cache.create(v4(6881), 1001);
        }

        assert!(!cache.validate(v4(6881), first));
        assert!(cache.validate(v4(6881), second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_id_validates_until_collected() {
        let cache = ConnectionCache::new(120);
        let id = cache.create(v4(6881), 1000);

        // well past max_age but no collection yet
        assert!(cache.validate(v4(6881), id));

        assert_eq!(cache.garbage_collect(1000 + 121), 1);
        assert!(!cache.validate(v4(6881), id));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_garbage_collect_keeps_fresh_entries() {
        let cache = ConnectionCache::new(120);
        let old = cache.create(v4(1), 1000);
        let fresh = cache.create(v4(2), 1100);

        assert_eq!(cache.garbage_collect(1200), 1);
        assert!(!cache.validate(v4(1), old));
        assert!(cache.validate(v4(2), fresh));
    }

    #[test]
    fn test_marshal_unmarshal_merges() {
        let cache = ConnectionCache::new(120);
        let a = cache.create(v4(6881), 1000);
        let b = cache.create(v6(6881), 1000);
        let data = cache.marshal().unwrap();

        let restored = ConnectionCache::new(120);
        let c = restored.create(v4(9999), 1000);
        assert_eq!(restored.unmarshal(&data).unwrap(), 2);

        assert!(restored.validate(v4(6881), a));
        assert!(restored.validate(v6(6881), b));
        assert!(restored.validate(v4(9999), c));
        assert_eq!(restored.len(), 3);
    }

    #[test]
    fn test_unmarshal_garbage_fails() {
        let cache = ConnectionCache::new(120);
        assert!(cache.unmarshal(&[0xc1, 0x00]).is_err());
    }
}
