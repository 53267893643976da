//! In-memory CoAP message model.

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::code::Code;
use crate::protocol::option::{self, decode_uint, encode_uint};

/// Transaction type carried in the header's `T` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Confirmable,
    NonConfirmable,
    Acknowledgement,
    Reset,
}

impl MessageType {
    /// Map the 2-bit header field (higher bits are ignored).
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            MessageType::Confirmable => 0,
            MessageType::NonConfirmable => 1,
            MessageType::Acknowledgement => 2,
            MessageType::Reset => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Confirmable => "CON",
            MessageType::NonConfirmable => "NON",
            MessageType::Acknowledgement => "ACK",
            MessageType::Reset => "RST",
        }
    }
}

/// One option instance (number + opaque value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapOption {
    pub number: u16,
    pub value: Bytes,
}

/// A decoded (or to-be-encoded) CoAP message.
///
/// Options are kept ordered by number; repeated options keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub mtype: MessageType,
    pub code: Code,
    pub message_id: u16,
    pub token: Bytes,
    pub options: Vec<CoapOption>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(mtype: MessageType, code: Code, message_id: u16) -> Self {
        Self {
            mtype,
            code,
            message_id,
            token: Bytes::new(),
            options: Vec::new(),
            payload: Bytes::new(),
        }
    }

    /// Empty message (code 0.00), used for pings, bare ACKs and resets.
    pub fn empty(mtype: MessageType, message_id: u16) -> Self {
        Self::new(mtype, Code::EMPTY, message_id)
    }

    /// RST answering the message with the given id.
    pub fn reset(message_id: u16) -> Self {
        Self::empty(MessageType::Reset, message_id)
    }

    pub fn with_token(mut self, token: Bytes) -> Self {
        self.token = token;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Insert an option after any existing option with a number <= `number`.
    pub fn add_option(&mut self, number: u16, value: Bytes) {
        let at = self
            .options
            .iter()
            .position(|o| o.number > number)
            .unwrap_or(self.options.len());
        self.options.insert(at, CoapOption { number, value });
    }

    pub fn remove_option(&mut self, number: u16) {
        self.options.retain(|o| o.number != number);
    }

    /// Replace all instances of `number` with a single uint value.
    pub fn set_uint_option(&mut self, number: u16, v: u32) {
        self.remove_option(number);
        self.add_option(number, encode_uint(v));
    }

    /// First value of `number`, if present.
    pub fn option(&self, number: u16) -> Option<&Bytes> {
        self.options
            .iter()
            .find(|o| o.number == number)
            .map(|o| &o.value)
    }

    pub fn option_values(&self, number: u16) -> impl Iterator<Item = &Bytes> {
        self.options
            .iter()
            .filter(move |o| o.number == number)
            .map(|o| &o.value)
    }

    pub fn uint_option(&self, number: u16) -> Result<Option<u32>> {
        self.option(number).map(|v| decode_uint(v)).transpose()
    }

    /// Request path built from Uri-Path options (`/a/b`), `""` when absent.
    pub fn uri_path(&self) -> String {
        self.option_values(option::URI_PATH)
            .map(|seg| format!("/{}", String::from_utf8_lossy(seg)))
            .collect()
    }

    /// Replace Uri-Path options with the segments of `path`.
    pub fn set_uri_path(&mut self, path: &str) {
        self.remove_option(option::URI_PATH);
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            self.add_option(option::URI_PATH, Bytes::copy_from_slice(seg.as_bytes()));
        }
    }

    /// Observe option value (`Ok(None)` when absent).
    pub fn observe(&self) -> Result<Option<u32>> {
        self.uint_option(option::OBSERVE)
    }

    pub fn set_observe(&mut self, seq: u32) {
        self.set_uint_option(option::OBSERVE, seq & option::OBSERVE_SEQ_MASK);
    }

    pub fn content_format(&self) -> Result<Option<u32>> {
        self.uint_option(option::CONTENT_FORMAT)
    }

    pub fn set_content_format(&mut self, format: u32) {
        self.set_uint_option(option::CONTENT_FORMAT, format);
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn options_stay_sorted() {
        let mut m = Message::new(MessageType::Confirmable, Code::GET, 1);
        m.add_option(option::URI_PATH, Bytes::from_static(b"a"));
        m.add_option(option::OBSERVE, Bytes::new());
        m.add_option(option::URI_PATH, Bytes::from_static(b"b"));
        let numbers: Vec<u16> = m.options.iter().map(|o| o.number).collect();
        assert_eq!(numbers, vec![option::OBSERVE, option::URI_PATH, option::URI_PATH]);
        assert_eq!(m.uri_path(), "/a/b");
    }

    #[test]
    fn set_uri_path_skips_empty_segments() {
        let mut m = Message::new(MessageType::NonConfirmable, Code::GET, 1);
        m.set_uri_path("/contador/");
        assert_eq!(m.uri_path(), "/contador");
        assert_eq!(m.option_values(option::URI_PATH).count(), 1);
    }

    #[test]
    fn observe_is_masked_to_24_bits() {
        let mut m = Message::new(MessageType::NonConfirmable, Code::CONTENT, 1);
        assert_eq!(m.observe().unwrap(), None);
        m.set_observe(0x0100_0002);
        assert_eq!(m.observe().unwrap(), Some(2));
        m.set_observe(0);
        assert_eq!(m.observe().unwrap(), Some(0));
        assert_eq!(m.option_values(option::OBSERVE).count(), 1);
    }
}
