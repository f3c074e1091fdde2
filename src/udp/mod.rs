//! BEP 15 UDP tracker: wire codec, per-action handlers and the socket server.

mod announce;
mod connect;
pub mod protocol;
mod scrape;
pub mod server;
