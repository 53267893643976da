//! Datagram codec (RFC 7252 section 3), panic-free.
//!
//! Parsing rules:
//! - Never index (`buf[0]`) — always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CoapError, Result};
use crate::protocol::code::Code;
use crate::protocol::message::{CoapOption, Message, MessageType};

/// Only protocol version 1 exists.
pub const VERSION: u8 = 1;
/// Separates options from the payload.
pub const PAYLOAD_MARKER: u8 = 0xff;
/// Tokens are 0..=8 bytes.
pub const MAX_TOKEN_LEN: usize = 8;

const EXT_BYTE: u8 = 13;
const EXT_WORD: u8 = 14;
const EXT_RESERVED: u8 = 15;
const EXT_BYTE_BASE: usize = 13;
const EXT_WORD_BASE: usize = 269;
const MAX_OPTION_FIELD: usize = EXT_WORD_BASE + u16::MAX as usize;

/// Header fields readable from the first four bytes.
///
/// Lets the transport answer a CON it could not fully decode with a RST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub mtype: MessageType,
    pub code: Code,
    pub message_id: u16,
}

/// Peek the fixed header without validating the rest of the datagram.
pub fn peek_header(raw: &[u8]) -> Option<Header> {
    let mut buf = raw;
    if buf.remaining() < 4 {
        return None;
    }
    let b0 = buf.get_u8();
    let code = Code::from_u8(buf.get_u8());
    let message_id = buf.get_u16();
    Some(Header {
        version: b0 >> 6,
        mtype: MessageType::from_bits(b0 >> 4),
        code,
        message_id,
    })
}

/// Decode one CoAP message from a datagram.
pub fn decode_message(mut buf: Bytes) -> Result<Message> {
    // Fixed header: ver/type/tkl, code, message id
    if buf.remaining() < 4 {
        return Err(CoapError::BadRequest("message too short".into()));
    }

    let b0 = buf.get_u8();
    if b0 >> 6 != VERSION {
        return Err(CoapError::UnsupportedVersion);
    }
    let mtype = MessageType::from_bits(b0 >> 4);
    let tkl = usize::from(b0 & 0x0f);
    if tkl > MAX_TOKEN_LEN {
        return Err(CoapError::BadRequest(format!("token length {tkl} > 8")));
    }

    let code = Code::from_u8(buf.get_u8());
    let message_id = buf.get_u16();

    if buf.remaining() < tkl {
        return Err(CoapError::BadRequest("truncated token".into()));
    }
    let token = buf.copy_to_bytes(tkl);

    if code.is_empty() && (tkl != 0 || buf.has_remaining()) {
        return Err(CoapError::BadRequest(
            "empty message must not carry token, options or payload".into(),
        ));
    }

    let mut options = Vec::new();
    let mut payload = Bytes::new();
    let mut number: usize = 0;

    while buf.has_remaining() {
        let byte = buf.get_u8();
        if byte == PAYLOAD_MARKER {
            if !buf.has_remaining() {
                return Err(CoapError::BadRequest("payload marker without payload".into()));
            }
            payload = buf.copy_to_bytes(buf.remaining());
            break;
        }

        let delta = read_extended(byte >> 4, &mut buf)?;
        let len = read_extended(byte & 0x0f, &mut buf)?;

        number += delta;
        let opt_number = u16::try_from(number)
            .map_err(|_| CoapError::BadRequest(format!("option number {number} out of range")))?;

        if buf.remaining() < len {
            return Err(CoapError::BadRequest(format!(
                "option {opt_number} truncated: need {len}, have {}",
                buf.remaining()
            )));
        }
        let value = buf.copy_to_bytes(len);
        options.push(CoapOption { number: opt_number, value });
    }

    Ok(Message {
        mtype,
        code,
        message_id,
        token,
        options,
        payload,
    })
}

fn read_extended(nibble: u8, buf: &mut Bytes) -> Result<usize> {
    match nibble {
        EXT_BYTE => {
            if buf.remaining() < 1 {
                return Err(CoapError::BadRequest("missing 8-bit option extension".into()));
            }
            Ok(EXT_BYTE_BASE + usize::from(buf.get_u8()))
        }
        EXT_WORD => {
            if buf.remaining() < 2 {
                return Err(CoapError::BadRequest("missing 16-bit option extension".into()));
            }
            Ok(EXT_WORD_BASE + usize::from(buf.get_u16()))
        }
        EXT_RESERVED => Err(CoapError::BadRequest("reserved option nibble 15".into())),
        n => Ok(usize::from(n)),
    }
}

/// Encode a message into a datagram.
pub fn encode_message(msg: &Message) -> Result<Bytes> {
    let tkl = msg.token.len();
    if tkl > MAX_TOKEN_LEN {
        return Err(CoapError::BadRequest(format!("token length {tkl} > 8")));
    }
    if msg.code.is_empty() && (tkl != 0 || !msg.options.is_empty() || !msg.payload.is_empty()) {
        return Err(CoapError::BadRequest(
            "empty message must not carry token, options or payload".into(),
        ));
    }

    let opt_bytes: usize = msg.options.iter().map(|o| o.value.len() + 5).sum();
    let mut out = BytesMut::with_capacity(4 + tkl + opt_bytes + 1 + msg.payload.len());

    // tkl <= 8, fits in the low nibble
    out.put_u8((VERSION << 6) | (msg.mtype.bits() << 4) | tkl as u8);
    out.put_u8(msg.code.as_u8());
    out.put_u16(msg.message_id);
    out.put_slice(&msg.token);

    // stable sort: repeated options keep their relative order
    let mut opts: Vec<&CoapOption> = msg.options.iter().collect();
    opts.sort_by_key(|o| o.number);

    let mut last: usize = 0;
    for opt in opts {
        let number = usize::from(opt.number);
        let delta = number - last;
        let len = opt.value.len();
        if len > MAX_OPTION_FIELD {
            return Err(CoapError::PayloadTooLarge);
        }

        let (d_nib, d_ext) = split_extended(delta);
        let (l_nib, l_ext) = split_extended(len);
        out.put_u8((d_nib << 4) | l_nib);
        put_extended(&mut out, d_ext);
        put_extended(&mut out, l_ext);
        out.put_slice(&opt.value);

        last = number;
    }

    if !msg.payload.is_empty() {
        out.put_u8(PAYLOAD_MARKER);
        out.put_slice(&msg.payload);
    }

    Ok(out.freeze())
}

enum Ext {
    None,
    Byte(u8),
    Word(u16),
}

// Callers bound `v` by MAX_OPTION_FIELD, so the narrowing casts cannot truncate.
fn split_extended(v: usize) -> (u8, Ext) {
    if v < EXT_BYTE_BASE {
        (v as u8, Ext::None)
    } else if v < EXT_WORD_BASE {
        (EXT_BYTE, Ext::Byte((v - EXT_BYTE_BASE) as u8))
    } else {
        (EXT_WORD, Ext::Word((v - EXT_WORD_BASE) as u16))
    }
}

fn put_extended(out: &mut BytesMut, ext: Ext) {
    match ext {
        Ext::None => {}
        Ext::Byte(b) => out.put_u8(b),
        Ext::Word(w) => out.put_u16(w),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::option;

    #[test]
    fn encodes_get_request_bytes() {
        let mut m = Message::new(MessageType::Confirmable, Code::GET, 0x1234)
            .with_token(Bytes::from_static(&[0xab]));
        m.set_uri_path("contador");

        let raw = encode_message(&m).unwrap();
        assert_eq!(
            &raw[..],
            &[
                0x41, 0x01, 0x12, 0x34, 0xab, 0xb8, b'c', b'o', b'n', b't', b'a', b'd', b'o',
                b'r'
            ]
        );
    }

    #[test]
    fn encodes_notification_with_observe_and_payload() {
        let mut m = Message::new(MessageType::NonConfirmable, Code::CONTENT, 0x0001)
            .with_token(Bytes::from_static(&[0x01, 0x02]))
            .with_payload(Bytes::from_static(b"ok"));
        m.set_observe(3);
        m.set_content_format(option::CONTENT_FORMAT_TEXT_PLAIN);

        let raw = encode_message(&m).unwrap();
        // observe (6) len 1 = 0x61 0x03, content-format (12) delta 6 len 0 = 0x60
        assert_eq!(
            &raw[..],
            &[0x52, 0x45, 0x00, 0x01, 0x01, 0x02, 0x61, 0x03, 0x60, 0xff, b'o', b'k']
        );
    }

    #[test]
    fn large_option_delta_uses_16_bit_extension() {
        let mut m = Message::new(MessageType::NonConfirmable, Code::GET, 9);
        m.add_option(300, Bytes::from_static(b"x"));

        let raw = encode_message(&m).unwrap();
        // delta 300 => nibble 14, ext 300 - 269 = 31
        assert_eq!(&raw[4..], &[0xe1, 0x00, 0x1f, b'x']);

        let back = decode_message(raw).unwrap();
        assert_eq!(back.options, m.options);
    }

    #[test]
    fn rejects_oversized_token_on_encode() {
        let m = Message::new(MessageType::Confirmable, Code::GET, 1)
            .with_token(Bytes::from_static(&[0; 9]));
        let err = encode_message(&m).unwrap_err();
        assert_eq!(err.kind().as_str(), "BAD_REQUEST");
    }

    #[test]
    fn peek_header_reads_type_and_id() {
        let h = peek_header(&[0x40, 0x01, 0xbe, 0xef, 0xf0]).unwrap();
        assert_eq!(h.version, 1);
        assert_eq!(h.mtype, MessageType::Confirmable);
        assert_eq!(h.message_id, 0xbeef);
        assert!(peek_header(&[0x40, 0x01]).is_none());
    }
}
