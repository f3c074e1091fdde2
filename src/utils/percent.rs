use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PercentDecodeError {
    #[error("incomplete percent-encoding at offset {0}")]
    Incomplete(usize),

    #[error("invalid hex digits in percent-encoding at offset {0}")]
    InvalidHex(usize),
}

/// Decode a URL-encoded query value into raw bytes.
///
/// Query values such as `info_hash` and `peer_id` carry arbitrary binary data, so
/// the result is a byte vector rather than a `String`. `+` decodes to a space.
pub fn percent_decode(encoded: &str) -> Result<Vec<u8>, PercentDecodeError> {
    let input = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        match input[i] {
            b'%' => {
                if i + 2 >= input.len() {
                    return Err(PercentDecodeError::Incomplete(i));
                }
                let hi = hex_value(input[i + 1]).ok_or(PercentDecodeError::InvalidHex(i))?;
                let lo = hex_value(input[i + 2]).ok_or(PercentDecodeError::InvalidHex(i))?;
                decoded.push((hi << 4) | lo);
                i += 3;
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }

    Ok(decoded)
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
