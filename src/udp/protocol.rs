//! Fixed-layout UDP tracker messages. All integers are big-endian.

use crate::core::error::ProtocolError;
use crate::models::event::AnnounceEvent;
use crate::models::peer::{InfoHash, PeerId};
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use std::io::{self, Write};

pub const PROTOCOL_MAGIC: i64 = 0x0000_0417_2710_1980;

/// Smallest valid frame: a connect request.
pub const MIN_REQUEST_SIZE: usize = 16;
pub const ANNOUNCE_REQUEST_SIZE: usize = 98;
pub const MAX_SCRAPE_HASHES: usize = 74;
/// Largest valid frame: a scrape carrying the maximum number of hashes.
pub const MAX_REQUEST_SIZE: usize = MIN_REQUEST_SIZE + 20 * MAX_SCRAPE_HASHES;
/// Read buffers are larger than any valid frame so oversized datagrams are
/// detected instead of silently truncated.
pub const READ_BUFFER_SIZE: usize = 2048;

pub const ANNOUNCE_HEADER_SIZE: usize = 20;
pub const SCRAPE_RECORD_SIZE: usize = 12;

pub const HEARTBEAT_OK: &[u8] = b"ok";

// Fixed client-visible error payloads, kept short to deny amplification value.
pub const ERR_TOO_SHORT: &[u8] = b"nope";
pub const ERR_INVALID_ACTION: &[u8] = b"invalid action";
pub const ERR_UNREGISTERED_CONNECTION: &[u8] = b"unregistered connection id";
pub const ERR_INVALID_PORT: &[u8] = b"invalid port";
pub const ERR_TOO_MANY_HASHES: &[u8] = b"exceeded 74 hashes";
pub const ERR_TOO_LARGE: &[u8] = b"request too large";
pub const ERR_PARSE_CONNECT: &[u8] = b"failed to parse connect";
pub const ERR_PARSE_ANNOUNCE: &[u8] = b"failed to parse announce";
pub const ERR_PARSE_SCRAPE: &[u8] = b"failed to parse scrape";
pub const ERR_INTERNAL: &[u8] = b"internal error";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Connect,
    Announce,
    Scrape,
    Error,
    Heartbeat,
}

impl Action {
    pub fn as_i32(self) -> i32 {
        match self {
            Action::Connect => 0,
            Action::Announce => 1,
            Action::Scrape => 2,
            Action::Error => 3,
            Action::Heartbeat => 4,
        }
    }

    pub fn from_i32(value: i32) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Action::Connect),
            1 => Ok(Action::Announce),
            2 => Ok(Action::Scrape),
            3 => Ok(Action::Error),
            4 => Ok(Action::Heartbeat),
            other => Err(ProtocolError::InvalidAction(other)),
        }
    }
}

/// The common 16-byte prefix of every request, read by offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestHeader {
    /// Protocol magic for connect requests
    pub connection_id: i64,
    pub action: i32,
    pub transaction_id: i32,
}

impl RequestHeader {
    pub fn peek(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len("request", data, MIN_REQUEST_SIZE)?;
        Ok(Self {
            connection_id: NetworkEndian::read_i64(&data[0..8]),
            action: NetworkEndian::read_i32(&data[8..12]),
            transaction_id: NetworkEndian::read_i32(&data[12..16]),
        })
    }
}

fn ensure_len(message: &'static str, data: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if data.len() < expected {
        return Err(ProtocolError::Truncated {
            message,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn read_id(data: &[u8]) -> [u8; 20] {
    let mut id = [0u8; 20];
    id.copy_from_slice(&data[..20]);
    id
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub transaction_id: i32,
}

impl ConnectRequest {
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_i64::<NetworkEndian>(PROTOCOL_MAGIC)?;
        out.write_i32::<NetworkEndian>(Action::Connect.as_i32())?;
        out.write_i32::<NetworkEndian>(self.transaction_id)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let header = RequestHeader::peek(data)?;
        if header.connection_id != PROTOCOL_MAGIC {
            return Err(ProtocolError::InvalidMagic(header.connection_id));
        }
        Ok(Self {
            transaction_id: header.transaction_id,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectResponse {
    pub transaction_id: i32,
    pub connection_id: i64,
}

impl ConnectResponse {
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_i32::<NetworkEndian>(Action::Connect.as_i32())?;
        out.write_i32::<NetworkEndian>(self.transaction_id)?;
        out.write_i64::<NetworkEndian>(self.connection_id)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len("connect response", data, 16)?;
        Ok(Self {
            transaction_id: NetworkEndian::read_i32(&data[4..8]),
            connection_id: NetworkEndian::read_i64(&data[8..16]),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub connection_id: i64,
    pub transaction_id: i32,
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub downloaded: i64,
    pub left: i64,
    pub uploaded: i64,
    pub event: AnnounceEvent,
    /// Client-claimed address; the tracker always uses the datagram source
    pub ip: u32,
    pub key: u32,
    /// Negative means "use the default"
    pub num_want: i32,
    pub port: u16,
}

impl AnnounceRequest {
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_i64::<NetworkEndian>(self.connection_id)?;
        out.write_i32::<NetworkEndian>(Action::Announce.as_i32())?;
        out.write_i32::<NetworkEndian>(self.transaction_id)?;
        out.write_all(&self.info_hash)?;
        out.write_all(&self.peer_id)?;
        out.write_i64::<NetworkEndian>(self.downloaded)?;
        out.write_i64::<NetworkEndian>(self.left)?;
        out.write_i64::<NetworkEndian>(self.uploaded)?;
        out.write_i32::<NetworkEndian>(self.event.as_i32())?;
        out.write_u32::<NetworkEndian>(self.ip)?;
        out.write_u32::<NetworkEndian>(self.key)?;
        out.write_i32::<NetworkEndian>(self.num_want)?;
        out.write_u16::<NetworkEndian>(self.port)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len("announce", data, ANNOUNCE_REQUEST_SIZE)?;

        let raw_event = NetworkEndian::read_i32(&data[80..84]);
        let event = AnnounceEvent::from_i32(raw_event).ok_or(ProtocolError::InvalidEvent(raw_event))?;

        Ok(Self {
            connection_id: NetworkEndian::read_i64(&data[0..8]),
            transaction_id: NetworkEndian::read_i32(&data[12..16]),
            info_hash: read_id(&data[16..36]),
            peer_id: read_id(&data[36..56]),
            downloaded: NetworkEndian::read_i64(&data[56..64]),
            left: NetworkEndian::read_i64(&data[64..72]),
            uploaded: NetworkEndian::read_i64(&data[72..80]),
            event,
            ip: NetworkEndian::read_u32(&data[84..88]),
            key: NetworkEndian::read_u32(&data[88..92]),
            num_want: NetworkEndian::read_i32(&data[92..96]),
            port: NetworkEndian::read_u16(&data[96..98]),
        })
    }
}

/// Announce reply; `peers` is an already packed compact peer list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnounceResponse<'a> {
    pub transaction_id: i32,
    pub interval: i32,
    pub leechers: i32,
    pub seeders: i32,
    pub peers: &'a [u8],
}

impl<'a> AnnounceResponse<'a> {
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_i32::<NetworkEndian>(Action::Announce.as_i32())?;
        out.write_i32::<NetworkEndian>(self.transaction_id)?;
        out.write_i32::<NetworkEndian>(self.interval)?;
        out.write_i32::<NetworkEndian>(self.leechers)?;
        out.write_i32::<NetworkEndian>(self.seeders)?;
        out.write_all(self.peers)
    }

    pub fn decode(data: &'a [u8]) -> Result<Self, ProtocolError> {
        ensure_len("announce response", data, ANNOUNCE_HEADER_SIZE)?;
        Ok(Self {
            transaction_id: NetworkEndian::read_i32(&data[4..8]),
            interval: NetworkEndian::read_i32(&data[8..12]),
            leechers: NetworkEndian::read_i32(&data[12..16]),
            seeders: NetworkEndian::read_i32(&data[16..20]),
            peers: &data[ANNOUNCE_HEADER_SIZE..],
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub connection_id: i64,
    pub transaction_id: i32,
    pub info_hashes: Vec<InfoHash>,
}

impl ScrapeRequest {
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_i64::<NetworkEndian>(self.connection_id)?;
        out.write_i32::<NetworkEndian>(Action::Scrape.as_i32())?;
        out.write_i32::<NetworkEndian>(self.transaction_id)?;
        for info_hash in &self.info_hashes {
            out.write_all(info_hash)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let header = RequestHeader::peek(data)?;

        let region = &data[MIN_REQUEST_SIZE..];
        if region.len() % 20 != 0 {
            return Err(ProtocolError::MisalignedHashes(region.len()));
        }

        Ok(Self {
            connection_id: header.connection_id,
            transaction_id: header.transaction_id,
            info_hashes: region.chunks_exact(20).map(read_id).collect(),
        })
    }
}

/// One 12-byte scrape record: complete, incomplete, downloaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub complete: i32,
    pub incomplete: i32,
    pub downloaded: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub transaction_id: i32,
    pub stats: Vec<ScrapeStats>,
}

impl ScrapeResponse {
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_i32::<NetworkEndian>(Action::Scrape.as_i32())?;
        out.write_i32::<NetworkEndian>(self.transaction_id)?;
        for stats in &self.stats {
            out.write_i32::<NetworkEndian>(stats.complete)?;
            out.write_i32::<NetworkEndian>(stats.incomplete)?;
            out.write_i32::<NetworkEndian>(stats.downloaded)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len("scrape response", data, 8)?;

        let records = &data[8..];
        if records.len() % SCRAPE_RECORD_SIZE != 0 {
            return Err(ProtocolError::Truncated {
                message: "scrape response",
                expected: 8 + (records.len() / SCRAPE_RECORD_SIZE + 1) * SCRAPE_RECORD_SIZE,
                actual: data.len(),
            });
        }

        let stats = records
            .chunks_exact(SCRAPE_RECORD_SIZE)
            .map(|record| ScrapeStats {
                complete: NetworkEndian::read_i32(&record[0..4]),
                incomplete: NetworkEndian::read_i32(&record[4..8]),
                downloaded: NetworkEndian::read_i32(&record[8..12]),
            })
            .collect();

        Ok(Self {
            transaction_id: NetworkEndian::read_i32(&data[4..8]),
            stats,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorResponse<'a> {
    pub transaction_id: i32,
    pub message: &'a [u8],
}

impl<'a> ErrorResponse<'a> {
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_i32::<NetworkEndian>(Action::Error.as_i32())?;
        out.write_i32::<NetworkEndian>(self.transaction_id)?;
        out.write_all(self.message)
    }

    pub fn decode(data: &'a [u8]) -> Result<Self, ProtocolError> {
        ensure_len("error response", data, 8)?;
        Ok(Self {
            transaction_id: NetworkEndian::read_i32(&data[4..8]),
            message: &data[8..],
        })
    }
}
