use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// 20-byte swarm identifier (SHA-1 of the torrent info dictionary).
pub type InfoHash = [u8; 20];

/// 20-byte client identifier, unique within a swarm.
pub type PeerId = [u8; 20];

/// A peer as tracked inside one swarm.
///
/// The owning swarm is keyed by info hash and the peer itself by peer id, so
/// neither identifier is repeated here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Address taken from the request source
    pub ip: IpAddr,
    pub port: u16,
    /// Sticky: once true it stays true until the peer is removed
    pub complete: bool,
    /// Unix timestamp of the last announce
    pub last_seen: i64,
}

impl Peer {
    pub fn new(ip: IpAddr, port: u16, complete: bool, last_seen: i64) -> Self {
        Self {
            ip,
            port,
            complete,
            last_seen,
        }
    }

    pub fn family(&self) -> IpFamily {
        IpFamily::of(&self.ip)
    }

    /// Width in bytes of this peer's compact (ip, port) entry.
    pub fn compact_len(&self) -> usize {
        self.family().compact_len()
    }

    /// Append the compact representation: raw address octets then big-endian port.
    pub fn write_compact(&self, buf: &mut Vec<u8>) {
        match self.ip {
            IpAddr::V4(ip) => buf.extend_from_slice(&ip.octets()),
            IpAddr::V6(ip) => buf.extend_from_slice(&ip.octets()),
        }
        buf.extend_from_slice(&self.port.to_be_bytes());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }

    pub fn compact_len(self) -> usize {
        match self {
            IpFamily::V4 => 6,
            IpFamily::V6 => 18,
        }
    }
}
