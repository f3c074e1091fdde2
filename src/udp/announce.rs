use crate::models::event::SwarmTransition;
use crate::models::peer::{IpFamily, Peer};
use crate::udp::protocol::{AnnounceRequest, AnnounceResponse, ERR_INVALID_PORT, ERR_PARSE_ANNOUNCE};
use crate::udp::server::UdpTracker;
use crate::utils::time::current_timestamp;
use std::net::SocketAddr;
use tracing::debug;

fn count(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

impl UdpTracker {
    pub(super) fn announce(&self, data: &[u8], remote: SocketAddr, transaction_id: i32, out: &mut Vec<u8>) {
        self.metrics.increment_udp_announces();

        let request = match AnnounceRequest::decode(data) {
            Ok(request) => request,
            Err(e) => {
                debug!(remote = %remote, error = %e, "Client sent invalid announce request");
                self.fatal(out, transaction_id, ERR_PARSE_ANNOUNCE);
                return;
            }
        };

        if request.port == 0 {
            debug!(remote = %remote, "Client announced port 0");
            self.fatal(out, request.transaction_id, ERR_INVALID_PORT);
            return;
        }

        let interval = self.config.jittered_interval();

        match request.event.transition(request.left) {
            SwarmTransition::Leave => {
                self.peer_store.drop_peer(&request.info_hash, &request.peer_id);

                let response = AnnounceResponse {
                    transaction_id: request.transaction_id,
                    interval,
                    leechers: 0,
                    seeders: 0,
                    peers: &[],
                };
                self.write_reply(out, |buf| response.encode(buf));
            }
            SwarmTransition::Upsert { complete } => {
                let peer = Peer::new(remote.ip(), request.port, complete, current_timestamp());
                self.peer_store.save(request.info_hash, request.peer_id, peer);

                let (seeders, leechers) = self.peer_store.hash_stats(&request.info_hash);
                let numwant = self.config.clamp_numwant(Some(request.num_want as i64));
                let peers = self
                    .peer_store
                    .peer_list_bytes(&request.info_hash, numwant, IpFamily::of(&remote.ip()));

                let response = AnnounceResponse {
                    transaction_id: request.transaction_id,
                    interval,
                    leechers: count(leechers),
                    seeders: count(seeders),
                    peers: &peers,
                };
                self.write_reply(out, |buf| response.encode(buf));
            }
        }
    }
}
