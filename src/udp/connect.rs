use crate::udp::protocol::{ConnectRequest, ConnectResponse, ERR_PARSE_CONNECT};
use crate::udp::server::UdpTracker;
use crate::utils::time::current_timestamp;
use std::net::SocketAddr;
use tracing::debug;

impl UdpTracker {
    pub(super) fn connect(&self, data: &[u8], remote: SocketAddr, transaction_id: i32, out: &mut Vec<u8>) {
        self.metrics.increment_udp_connects();

        let request = match ConnectRequest::decode(data) {
            Ok(request) => request,
            Err(e) => {
                debug!(remote = %remote, error = %e, "Client sent invalid connect request");
                self.fatal(out, transaction_id, ERR_PARSE_CONNECT);
                return;
            }
        };

        let response = ConnectResponse {
            transaction_id: request.transaction_id,
            connection_id: self.connections.create(remote, current_timestamp()),
        };

        self.write_reply(out, |buf| response.encode(buf));
    }
}
