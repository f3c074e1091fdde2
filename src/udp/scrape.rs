use crate::udp::protocol::{
    ScrapeRequest, ScrapeResponse, ScrapeStats, ERR_PARSE_SCRAPE, ERR_TOO_MANY_HASHES, MAX_SCRAPE_HASHES,
};
use crate::udp::server::UdpTracker;
use std::net::SocketAddr;
use tracing::debug;

/// Completed downloads are not tracked.
const DOWNLOADED_UNKNOWN: i32 = -1;

impl UdpTracker {
    pub(super) fn scrape(&self, data: &[u8], remote: SocketAddr, transaction_id: i32, out: &mut Vec<u8>) {
        self.metrics.increment_udp_scrapes();

        let request = match ScrapeRequest::decode(data) {
            Ok(request) => request,
            Err(e) => {
                debug!(remote = %remote, error = %e, "Client sent invalid scrape request");
                self.fatal(out, transaction_id, ERR_PARSE_SCRAPE);
                return;
            }
        };

        if request.info_hashes.len() > MAX_SCRAPE_HASHES {
            debug!(remote = %remote, hashes = request.info_hashes.len(), "Client sent oversized scrape request");
            self.fatal(out, request.transaction_id, ERR_TOO_MANY_HASHES);
            return;
        }

        let stats = request
            .info_hashes
            .iter()
            .map(|info_hash| {
                let (complete, incomplete) = self.peer_store.hash_stats(info_hash);
                ScrapeStats {
                    complete: i32::try_from(complete).unwrap_or(i32::MAX),
                    incomplete: i32::try_from(incomplete).unwrap_or(i32::MAX),
                    downloaded: DOWNLOADED_UNKNOWN,
                }
            })
            .collect();

        let response = ScrapeResponse {
            transaction_id: request.transaction_id,
            stats,
        };
        self.write_reply(out, |buf| response.encode(buf));
    }
}
