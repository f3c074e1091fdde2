use super::encoder::DictWriter;
use crate::models::peer::{InfoHash, IpFamily, Peer, PeerId};
use std::collections::BTreeMap;

/// Peers section of an HTTP announce reply.
pub enum PeerList<'a> {
    /// Packed (ip, port) entries, all of one address family.
    Compact { family: IpFamily, bytes: &'a [u8] },
    /// One dictionary per peer.
    Dict {
        peers: &'a [(PeerId, Peer)],
        include_peer_id: bool,
    },
}

/// Build an announce reply.
///
/// IPv6 compact lists go under `peers6`; `peers` is still written, empty, so
/// clients that only look for `peers` see a well-formed reply.
pub fn build_announce_response(seeders: u32, leechers: u32, interval: i32, peers: PeerList<'_>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    let mut dict = DictWriter::begin(&mut buf);

    dict.entry("complete", &seeders)
        .entry("incomplete", &leechers)
        .entry("interval", &i64::from(interval));

    match peers {
        PeerList::Compact {
            family: IpFamily::V4,
            bytes,
        } => {
            dict.entry("peers", &bytes);
        }
        PeerList::Compact {
            family: IpFamily::V6,
            bytes,
        } => {
            dict.entry("peers", &b"".as_slice()).entry("peers6", &bytes);
        }
        PeerList::Dict {
            peers,
            include_peer_id,
        } => {
            encode_dict_peers(peers, include_peer_id, dict.key("peers"));
        }
    }

    dict.end();
    buf
}

fn encode_dict_peers(peers: &[(PeerId, Peer)], include_peer_id: bool, buf: &mut Vec<u8>) {
    buf.push(b'l');

    for (peer_id, peer) in peers {
        let ip = peer.ip.to_string();

        let mut dict = DictWriter::begin(buf);
        dict.entry("ip", &ip.as_str());
        if include_peer_id {
            dict.entry("peer id", peer_id);
        }
        dict.entry("port", &u32::from(peer.port));
        dict.end();
    }

    buf.push(b'e');
}

/// Build a scrape reply. Each entry is `(info_hash, seeders, leechers)`;
/// duplicates collapse and keys come out in byte order.
pub fn build_scrape_response<I>(files: I) -> Vec<u8>
where
    I: IntoIterator<Item = (InfoHash, u32, u32)>,
{
    let files: BTreeMap<InfoHash, (u32, u32)> = files
        .into_iter()
        .map(|(info_hash, seeders, leechers)| (info_hash, (seeders, leechers)))
        .collect();

    let mut buf = Vec::with_capacity(16 + files.len() * 64);
    let mut outer = DictWriter::begin(&mut buf);

    let mut inner = DictWriter::begin(outer.key("files"));
    for (info_hash, (seeders, leechers)) in &files {
        let mut stats = DictWriter::begin(inner.key(info_hash));
        stats
            .entry("complete", seeders)
            .entry("downloaded", &0i64)
            .entry("incomplete", leechers);
        stats.end();
    }
    inner.end();

    outer.end();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn v4_peer(octets: [u8; 4], port: u16) -> Peer {
        Peer::new(IpAddr::V4(Ipv4Addr::from(octets)), port, false, 1000)
    }

    #[test]
    fn test_announce_compact_ipv4() {
        let mut bytes = Vec::new();
        v4_peer([192, 168, 1, 1], 6881).write_compact(&mut bytes);

        let response = build_announce_response(
            5,
            3,
            1800,
            PeerList::Compact {
                family: IpFamily::V4,
                bytes: &bytes,
            },
        );

        let mut expected = b"d8:completei5e10:incompletei3e8:intervali1800e5:peers6:".to_vec();
        expected.extend_from_slice(&[192, 168, 1, 1, 0x1a, 0xe1]);
        expected.push(b'e');
        assert_eq!(response, expected);
    }

    #[test]
    fn test_announce_compact_ipv6() {
        let peer = Peer::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 6881, true, 1000);
        let mut bytes = Vec::new();
        peer.write_compact(&mut bytes);

        let response = build_announce_response(
            1,
            0,
            60,
            PeerList::Compact {
                family: IpFamily::V6,
                bytes: &bytes,
            },
        );

        let mut expected = b"d8:completei1e10:incompletei0e8:intervali60e5:peers0:6:peers618:".to_vec();
        expected.extend_from_slice(&bytes);
        expected.push(b'e');
        assert_eq!(response, expected);
    }

    #[test]
    fn test_announce_empty_compact() {
        let response = build_announce_response(
            0,
            0,
            1800,
            PeerList::Compact {
                family: IpFamily::V4,
                bytes: &[],
            },
        );
        assert_eq!(
            response,
            b"d8:completei0e10:incompletei0e8:intervali1800e5:peers0:e"
        );
    }

    #[test]
    fn test_announce_dict_peers() {
        let peers = vec![([b'a'; 20], v4_peer([10, 0, 0, 1], 51413))];

        let response = build_announce_response(
            0,
            1,
            1800,
            PeerList::Dict {
                peers: &peers,
                include_peer_id: true,
            },
        );

        let expected = b"d8:completei0e10:incompletei1e8:intervali1800e5:peers\
ld2:ip8:10.0.0.17:peer id20:aaaaaaaaaaaaaaaaaaaa4:porti51413eeee";
        assert_eq!(response, expected.to_vec());
    }

    #[test]
    fn test_announce_dict_peers_without_peer_id() {
        let peers = vec![([b'a'; 20], v4_peer([10, 0, 0, 1], 6881))];

        let response = build_announce_response(
            0,
            1,
            1800,
            PeerList::Dict {
                peers: &peers,
                include_peer_id: false,
            },
        );

        let text = String::from_utf8_lossy(&response);
        assert!(text.contains("d2:ip8:10.0.0.14:porti6881ee"));
        assert!(!text.contains("peer id"));
    }

    #[test]
    fn test_scrape_response_sorted_and_deduplicated() {
        let response = build_scrape_response(vec![
            ([b'z'; 20], 2, 1),
            ([b'a'; 20], 0, 4),
            ([b'z'; 20], 2, 1),
        ]);

        let expected = b"d5:filesd\
20:aaaaaaaaaaaaaaaaaaaad8:completei0e10:downloadedi0e10:incompletei4ee\
20:zzzzzzzzzzzzzzzzzzzzd8:completei2e10:downloadedi0e10:incompletei1ee\
ee";
        assert_eq!(response, expected.to_vec());
    }

    #[test]
    fn test_scrape_response_empty() {
        let response = build_scrape_response(Vec::new());
        assert_eq!(response, b"d5:filesdee");
    }
}
