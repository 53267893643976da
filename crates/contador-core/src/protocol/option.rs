//! Option numbers and uint option value helpers.

use bytes::Bytes;

use crate::error::{CoapError, Result};

pub const IF_MATCH: u16 = 1;
pub const URI_HOST: u16 = 3;
pub const ETAG: u16 = 4;
pub const IF_NONE_MATCH: u16 = 5;
/// RFC 7641.
pub const OBSERVE: u16 = 6;
pub const URI_PORT: u16 = 7;
pub const LOCATION_PATH: u16 = 8;
pub const URI_PATH: u16 = 11;
pub const CONTENT_FORMAT: u16 = 12;
pub const MAX_AGE: u16 = 14;
pub const URI_QUERY: u16 = 15;
pub const ACCEPT: u16 = 17;
pub const LOCATION_QUERY: u16 = 20;
pub const PROXY_URI: u16 = 35;
pub const PROXY_SCHEME: u16 = 39;
pub const SIZE1: u16 = 60;

/// Content-Format `text/plain; charset=utf-8`.
pub const CONTENT_FORMAT_TEXT_PLAIN: u32 = 0;

/// Observe value that registers an observer.
pub const OBSERVE_REGISTER: u32 = 0;
/// Observe value that deregisters an observer.
pub const OBSERVE_DEREGISTER: u32 = 1;
/// Observe sequence numbers are 24 bits wide.
pub const OBSERVE_SEQ_MASK: u32 = 0x00ff_ffff;

/// Encode a uint option value using the minimal number of bytes (0 => empty).
pub fn encode_uint(v: u32) -> Bytes {
    let raw = v.to_be_bytes();
    let skip = raw.iter().take_while(|b| **b == 0).count();
    Bytes::copy_from_slice(&raw[skip..])
}

/// Decode a uint option value (0..=4 bytes, big endian).
pub fn decode_uint(raw: &[u8]) -> Result<u32> {
    if raw.len() > 4 {
        return Err(CoapError::BadRequest(format!(
            "uint option too long: {} bytes",
            raw.len()
        )));
    }
    Ok(raw.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Critical options must be understood by the receiver (odd numbers).
pub fn is_critical(number: u16) -> bool {
    number & 0x01 != 0
}
