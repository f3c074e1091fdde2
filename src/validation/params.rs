use crate::core::error::ValidationError;
use crate::models::event::AnnounceEvent;
use crate::models::peer::{InfoHash, PeerId};
use crate::udp::protocol::MAX_SCRAPE_HASHES;
use crate::utils::percent::percent_decode;

/// A validated HTTP announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceParams {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: i64,
    pub downloaded: i64,
    pub left: i64,
    pub event: AnnounceEvent,
    /// Raw client value; the tracker config resolves defaults and the ceiling
    pub numwant: Option<i64>,
    pub compact: bool,
    pub no_peer_id: bool,
}

/// A validated HTTP scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeParams {
    pub info_hashes: Vec<InfoHash>,
}

/// Split a raw query string into `(key, value)` pairs without decoding.
/// A key with no `=` gets an empty value.
fn query_pairs(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
}

fn decode_id(value: &str, err: ValidationError) -> Result<[u8; 20], ValidationError> {
    let bytes = percent_decode(value).map_err(|_| err.clone())?;
    bytes.try_into().map_err(|_| err)
}

fn decode_text(value: &str, err: ValidationError) -> Result<String, ValidationError> {
    let bytes = percent_decode(value).map_err(|_| err.clone())?;
    String::from_utf8(bytes).map_err(|_| err)
}

fn parse_number(value: &str, name: &'static str) -> Result<i64, ValidationError> {
    decode_text(value, ValidationError::InvalidFormat(name))?
        .parse()
        .map_err(|_| ValidationError::InvalidFormat(name))
}

fn parse_flag(value: &str, name: &'static str) -> Result<bool, ValidationError> {
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(ValidationError::InvalidFormat(name)),
    }
}

impl AnnounceParams {
    /// Parse the raw query of `/announce`. Later duplicates of a key win.
    pub fn parse(query: &str) -> Result<Self, ValidationError> {
        let mut info_hash = None;
        let mut peer_id = None;
        let mut port = None;
        let mut uploaded = 0;
        let mut downloaded = 0;
        let mut left = None;
        let mut event = AnnounceEvent::None;
        let mut numwant = None;
        let mut compact = true;
        let mut no_peer_id = false;

        for (key, value) in query_pairs(query) {
            match key {
                "info_hash" => info_hash = Some(decode_id(value, ValidationError::InvalidInfoHash)?),
                "peer_id" => peer_id = Some(decode_id(value, ValidationError::InvalidPeerId)?),
                "port" => {
                    let text = decode_text(value, ValidationError::InvalidPort)?;
                    match text.parse::<u16>() {
                        Ok(p) if p != 0 => port = Some(p),
                        _ => return Err(ValidationError::InvalidPort),
                    }
                }
                "uploaded" => uploaded = parse_number(value, "uploaded")?,
                "downloaded" => downloaded = parse_number(value, "downloaded")?,
                "left" => left = Some(parse_number(value, "left")?),
                "event" => {
                    let text = decode_text(value, ValidationError::InvalidEvent)?;
                    event = AnnounceEvent::from_query(&text).ok_or(ValidationError::InvalidEvent)?;
                }
                "numwant" => {
                    let text = decode_text(value, ValidationError::InvalidNumwant)?;
                    numwant = Some(text.parse().map_err(|_| ValidationError::InvalidNumwant)?);
                }
                "compact" => compact = parse_flag(value, "compact")?,
                "no_peer_id" => no_peer_id = parse_flag(value, "no_peer_id")?,
                _ => {}
            }
        }

        Ok(Self {
            info_hash: info_hash.ok_or(ValidationError::MissingParameter("info_hash"))?,
            peer_id: peer_id.ok_or(ValidationError::MissingParameter("peer_id"))?,
            port: port.ok_or(ValidationError::MissingParameter("port"))?,
            uploaded,
            downloaded,
            left: left.ok_or(ValidationError::MissingParameter("left"))?,
            event,
            numwant,
            compact,
            no_peer_id,
        })
    }
}

impl ScrapeParams {
    /// Parse the raw query of `/scrape`: one or more `info_hash` keys.
    pub fn parse(query: &str) -> Result<Self, ValidationError> {
        let mut info_hashes = Vec::new();

        for (key, value) in query_pairs(query) {
            if key != "info_hash" {
                continue;
            }
            if info_hashes.len() == MAX_SCRAPE_HASHES {
                return Err(ValidationError::TooManyHashes(MAX_SCRAPE_HASHES));
            }
            info_hashes.push(decode_id(value, ValidationError::InvalidInfoHash)?);
        }

        if info_hashes.is_empty() {
            return Err(ValidationError::MissingParameter("info_hash"));
        }

        Ok(Self { info_hashes })
    }
}
