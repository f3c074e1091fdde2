// Centralized error handling for the tracker

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// A datagram that does not match the fixed UDP message layout.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed {message}: need at least {expected} bytes, got {actual}")]
    Truncated {
        message: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("malformed scrape: hash region of {0} bytes is not a multiple of 20")]
    MisalignedHashes(usize),

    #[error("malformed connect: unexpected protocol magic {0:#018x}")]
    InvalidMagic(i64),

    #[error("unknown action {0}")]
    InvalidAction(i32),

    #[error("malformed announce: unknown event {0}")]
    InvalidEvent(i32),
}

/// Failure to encode or decode an in-memory snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("backup backend used before init")]
    NotInitialized,

    #[error("file backup requires a path")]
    MissingPath,

    #[error("backup i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// HTTP announce/scrape parameter validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing {0}")]
    MissingParameter(&'static str),

    #[error("invalid info hash")]
    InvalidInfoHash,

    #[error("invalid peer id")]
    InvalidPeerId,

    #[error("invalid port")]
    InvalidPort,

    #[error("invalid numwant")]
    InvalidNumwant,

    #[error("invalid event")]
    InvalidEvent,

    #[error("invalid {0}")]
    InvalidFormat(&'static str),

    #[error("exceeded {0} hashes")]
    TooManyHashes(usize),
}

/// Errors surfaced to HTTP clients as a bencoded `failure reason`.
#[derive(Error, Debug)]
pub enum AnnounceError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("This is a BitTorrent tracker announce URL, not meant to be opened in a web browser.")]
    BrowserAccess,

    #[error("internal server error")]
    Internal,
}

impl IntoResponse for AnnounceError {
    fn into_response(self) -> Response {
        use crate::bencode::encoder::DictWriter;

        let message = self.to_string();

        let mut buf = Vec::with_capacity(32 + message.len());
        let mut dict = DictWriter::begin(&mut buf);
        dict.entry("failure reason", &message.as_str());
        dict.end();

        (
            StatusCode::OK,
            [("Content-Type", "text/plain")],
            buf,
        )
            .into_response()
    }
}
