use crate::core::config::TrackerConfig;
use crate::metrics::collector::Metrics;
use crate::stores::buffer_pool::BufferPool;
use crate::stores::connection_cache::ConnectionCache;
use crate::stores::peer_store::PeerStore;
use crate::udp::protocol::{
    Action, ErrorResponse, RequestHeader, ERR_INTERNAL, ERR_INVALID_ACTION, ERR_TOO_LARGE, ERR_TOO_MANY_HASHES,
    ERR_TOO_SHORT, ERR_UNREGISTERED_CONNECTION, HEARTBEAT_OK, MAX_REQUEST_SIZE, READ_BUFFER_SIZE,
};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// The UDP tracker state machine.
///
/// Stateless per datagram apart from the shared stores: `process` turns one
/// request into exactly one reply.
pub struct UdpTracker {
    pub(super) config: TrackerConfig,
    validate_connection_id: bool,
    pub(super) peer_store: Arc<PeerStore>,
    pub(super) connections: Arc<ConnectionCache>,
    pub(super) metrics: Arc<Metrics>,
}

impl UdpTracker {
    /// `validate_connection_id = false` accepts announce and scrape with any
    /// connection id, which gives up protection against spoofed sources.
    pub fn new(
        config: TrackerConfig,
        validate_connection_id: bool,
        peer_store: Arc<PeerStore>,
        connections: Arc<ConnectionCache>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            validate_connection_id,
            peer_store,
            connections,
            metrics,
        }
    }

    /// Handle one datagram from `remote`, writing the reply into `out`.
    pub fn process(&self, data: &[u8], remote: SocketAddr, out: &mut Vec<u8>) {
        out.clear();
        self.metrics.increment_udp_hits();

        let header = match RequestHeader::peek(data) {
            Ok(header) => header,
            Err(_) => {
                debug!(remote = %remote, size = data.len(), "Client sent packet below minimum request size");
                self.metrics.increment_client_errors();
                out.extend_from_slice(ERR_TOO_SHORT);
                return;
            }
        };

        let remote = SocketAddr::new(remote.ip().to_canonical(), remote.port());
        let transaction_id = header.transaction_id;

        let action = match Action::from_i32(header.action) {
            Err(_) => {
                debug!(remote = %remote, action = header.action, "Client sent invalid action");
                self.fatal(out, transaction_id, ERR_INVALID_ACTION);
                return;
            }
            Ok(action) => action,
        };

        // A scrape above the frame limit carries more than 74 hashes' worth of
        // bytes. Reads that fill the whole buffer may be cut short, so the hash
        // region is not decoded.
        if data.len() > MAX_REQUEST_SIZE {
            debug!(remote = %remote, size = data.len(), action = ?action, "Client sent oversized request");
            let message = if action == Action::Scrape {
                ERR_TOO_MANY_HASHES
            } else {
                ERR_TOO_LARGE
            };
            self.fatal(out, transaction_id, message);
            return;
        }

        match action {
            Action::Heartbeat => {
                self.metrics.increment_udp_heartbeats();
                out.extend_from_slice(HEARTBEAT_OK);
            }
            Action::Connect => self.connect(data, remote, transaction_id, out),
            Action::Announce | Action::Scrape => {
                if self.validate_connection_id && !self.connections.validate(remote, header.connection_id) {
                    debug!(
                        remote = %remote,
                        connection_id = header.connection_id,
                        "Client sent unregistered connection id"
                    );
                    self.fatal(out, transaction_id, ERR_UNREGISTERED_CONNECTION);
                    return;
                }

                if action == Action::Announce {
                    self.announce(data, remote, transaction_id, out);
                } else {
                    self.scrape(data, remote, transaction_id, out);
                }
            }
            // only the tracker sends errors
            Action::Error => {
                debug!(remote = %remote, "Client sent error action");
                self.fatal(out, transaction_id, ERR_INVALID_ACTION);
            }
        }
    }

    /// Reply with a fixed error message.
    pub(super) fn fatal(&self, out: &mut Vec<u8>, transaction_id: i32, message: &[u8]) {
        self.metrics.increment_client_errors();
        let response = ErrorResponse {
            transaction_id,
            message,
        };
        self.write_reply(out, |buf| response.encode(buf));
    }

    /// Run an encoder into `out`. On failure the partial reply is discarded and
    /// replaced by a hardcoded string so the client still gets a datagram.
    pub(super) fn write_reply(&self, out: &mut Vec<u8>, encode: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) {
        out.clear();
        if let Err(e) = encode(out) {
            error!(error = %e, "Failed to encode UDP reply");
            self.metrics.increment_internal_errors();
            out.clear();
            out.extend_from_slice(ERR_INTERNAL);
        }
    }
}

/// A bound UDP socket shared by a fixed number of worker tasks.
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    tracker: Arc<UdpTracker>,
}

impl UdpServer {
    pub async fn bind(addr: SocketAddr, tracker: Arc<UdpTracker>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            tracker,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve until `shutdown` flips to true or its sender is dropped.
    ///
    /// Memory is bounded by `workers` pairs of pooled read/reply buffers.
    pub async fn serve(self, workers: usize, shutdown: watch::Receiver<bool>) {
        let buffers = BufferPool::new(workers * 2, READ_BUFFER_SIZE);
        let mut tasks = JoinSet::new();

        for worker_id in 0..workers {
            tasks.spawn(worker_loop(
                worker_id,
                Arc::clone(&self.socket),
                Arc::clone(&self.tracker),
                Arc::clone(&buffers),
                shutdown.clone(),
            ));
        }

        info!(address = ?self.socket.local_addr().ok(), workers, "UDP tracker serving");

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "UDP worker task failed");
            }
        }

        info!("UDP tracker stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    socket: Arc<UdpSocket>,
    tracker: Arc<UdpTracker>,
    buffers: Arc<BufferPool>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let mut request = buffers.acquire();
        request.resize(READ_BUFFER_SIZE, 0);

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            result = socket.recv_from(&mut request) => result,
        };

        let (size, remote) = match received {
            Ok(received) => received,
            Err(e) => {
                error!(worker_id, error = %e, "Failed to read from UDP socket");
                continue;
            }
        };

        let mut reply = buffers.acquire();
        tracker.process(&request[..size], remote, &mut reply);

        if let Err(e) = socket.send_to(&reply, remote).await {
            debug!(worker_id, remote = %remote, error = %e, "Failed to send UDP reply");
        }
    }

    debug!(worker_id, "UDP worker stopping");
}
