use crate::core::error::SnapshotError;
use crate::models::peer::{InfoHash, IpFamily, Peer, PeerId};
use crate::stores::buffer_pool::{BufferPool, PooledBuffer};
use crate::utils::time::is_expired;
use dashmap::DashMap;
use rand::seq::IteratorRandom;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Peers of one info hash plus a running seeder count.
#[derive(Debug, Default)]
struct Swarm {
    peers: HashMap<PeerId, Peer>,
    seeders: u32,
}

impl Swarm {
    fn stats(&self) -> (u32, u32) {
        let total = self.peers.len() as u32;
        (self.seeders, total - self.seeders)
    }

    fn remove(&mut self, peer_id: &PeerId) -> Option<Peer> {
        let removed = self.peers.remove(peer_id)?;
        if removed.complete {
            self.seeders -= 1;
        }
        Some(removed)
    }
}

type SwarmSnapshot = Vec<(InfoHash, Vec<(PeerId, Peer)>)>;

/// In-memory swarm database.
///
/// The outer map is sharded by info hash, so writers to different swarms rarely
/// contend. Callers only ever receive copies of peers or packed byte buffers.
pub struct PeerStore {
    swarms: DashMap<InfoHash, Swarm>,
    list_pool: Arc<BufferPool>,
}

impl PeerStore {
    pub fn new(list_pool_capacity: usize, max_numwant: usize) -> Self {
        Self {
            swarms: DashMap::new(),
            list_pool: BufferPool::new(list_pool_capacity, max_numwant * IpFamily::V6.compact_len()),
        }
    }

    /// Insert or refresh a peer.
    ///
    /// An existing peer gets a new ip, port and last_seen; its `complete` flag is
    /// only ever raised, never cleared.
    pub fn save(&self, info_hash: InfoHash, peer_id: PeerId, peer: Peer) {
        let mut swarm = self.swarms.entry(info_hash).or_default();
        let Swarm { peers, seeders } = &mut *swarm;

        match peers.entry(peer_id) {
            Entry::Vacant(entry) => {
                if peer.complete {
                    *seeders += 1;
                }
                entry.insert(peer);
            }
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.ip = peer.ip;
                existing.port = peer.port;
                existing.last_seen = peer.last_seen;
                if peer.complete && !existing.complete {
                    existing.complete = true;
                    *seeders += 1;
                }
            }
        }
    }

    /// Remove a peer. Returns whether it was present; absence is not an error.
    pub fn drop_peer(&self, info_hash: &InfoHash, peer_id: &PeerId) -> bool {
        let (removed, now_empty) = match self.swarms.get_mut(info_hash) {
            Some(mut swarm) => {
                let removed = swarm.remove(peer_id).is_some();
                (removed, swarm.peers.is_empty())
            }
            None => return false,
        };

        if now_empty {
            self.swarms.remove_if(info_hash, |_, swarm| swarm.peers.is_empty());
        }

        removed
    }

    /// `(complete, incomplete)` for a swarm; `(0, 0)` when unknown.
    pub fn hash_stats(&self, info_hash: &InfoHash) -> (u32, u32) {
        self.swarms
            .get(info_hash)
            .map(|swarm| swarm.stats())
            .unwrap_or((0, 0))
    }

    /// Up to `numwant` peers, uniformly sampled without replacement when the
    /// swarm is larger. `exclude` drops the requesting peer from the result.
    pub fn peer_list(
        &self,
        info_hash: &InfoHash,
        numwant: usize,
        exclude: Option<&PeerId>,
    ) -> Vec<(PeerId, Peer)> {
        let swarm = match self.swarms.get(info_hash) {
            Some(swarm) => swarm,
            None => return Vec::new(),
        };

        let candidates = swarm
            .peers
            .iter()
            .filter(|(peer_id, _)| exclude != Some(*peer_id))
            .map(|(peer_id, peer)| (*peer_id, *peer));

        if swarm.peers.len() <= numwant {
            return candidates.collect();
        }

        let mut rng = rand::rng();
        candidates.choose_multiple(&mut rng, numwant)
    }

    /// Compact (ip, port) entries for up to `numwant` peers of one address family,
    /// packed into a pooled buffer.
    pub fn peer_list_bytes(&self, info_hash: &InfoHash, numwant: usize, family: IpFamily) -> PooledBuffer {
        let mut buf = self.list_pool.acquire();

        let swarm = match self.swarms.get(info_hash) {
            Some(swarm) => swarm,
            None => return buf,
        };

        let candidates = swarm.peers.values().filter(|peer| peer.family() == family);
        buf.reserve(numwant.min(swarm.peers.len()) * family.compact_len());

        if swarm.peers.len() <= numwant {
            for peer in candidates {
                peer.write_compact(&mut buf);
            }
        } else {
            let mut rng = rand::rng();
            for peer in candidates.choose_multiple(&mut rng, numwant) {
                peer.write_compact(&mut buf);
            }
        }

        buf
    }

    /// Remove every peer not seen within `ttl` seconds of `now`, then every swarm
    /// left empty. Returns the number of peers removed.
    pub fn trim(&self, now: i64, ttl: i64) -> usize {
        let mut removed = 0;

        self.swarms.retain(|_, swarm| {
            let before = swarm.peers.len();
            let mut expired_seeders = 0;

            swarm.peers.retain(|_, peer| {
                let keep = !is_expired(peer.last_seen, ttl, now);
                if !keep && peer.complete {
                    expired_seeders += 1;
                }
                keep
            });

            swarm.seeders -= expired_seeders;
            removed += before - swarm.peers.len();

            !swarm.peers.is_empty()
        });

        removed
    }

    /// Serialize every swarm into an opaque MessagePack blob.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let snapshot: SwarmSnapshot = self
            .swarms
            .iter()
            .map(|entry| {
                let peers = entry.value().peers.iter().map(|(id, peer)| (*id, *peer)).collect();
                (*entry.key(), peers)
            })
            .collect();

        Ok(rmp_serde::to_vec(&snapshot)?)
    }

    /// Replace the whole dataset with a blob produced by [`PeerStore::encode`].
    /// Returns the number of peers loaded.
    pub fn load(&self, data: &[u8]) -> Result<usize, SnapshotError> {
        let snapshot: SwarmSnapshot = rmp_serde::from_slice(data)?;

        self.swarms.clear();
        let mut loaded = 0;

        for (info_hash, peers) in snapshot {
            let mut swarm = Swarm::default();
            for (peer_id, peer) in peers {
                if swarm.peers.insert(peer_id, peer).is_none() {
                    loaded += 1;
                    if peer.complete {
                        swarm.seeders += 1;
                    }
                }
            }
            if !swarm.peers.is_empty() {
                self.swarms.insert(info_hash, swarm);
            }
        }

        Ok(loaded)
    }

    pub fn total_peers(&self) -> usize {
        self.swarms.iter().map(|entry| entry.value().peers.len()).sum()
    }

    pub fn total_seeders(&self) -> usize {
        self.swarms.iter().map(|entry| entry.value().seeders as usize).sum()
    }

    /// Number of swarms with at least one peer
    pub fn active_swarms(&self) -> usize {
        self.swarms.len()
    }
}
