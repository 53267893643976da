//! Decode-once datagram classification.
//!
//! - Requests (CON/NON with a method code) => `Inbound::Request`
//! - Empty CON => ping, answered with RST
//! - RST => may cancel an observation
//! - Anything undecodable => `Malformed`, with a RST hint when the header
//!   says it was confirmable

use bytes::Bytes;
use contador_core::{
    error::CoapError,
    protocol::{codec::peek_header, decode_message, Message, MessageType},
};

#[derive(Debug)]
pub enum Inbound {
    Request(Message),
    Ping { message_id: u16 },
    Reset { message_id: u16 },
    Ack { message_id: u16 },
    Ignored(&'static str),
    Malformed { error: CoapError, reset_id: Option<u16> },
}

pub fn classify(raw: Bytes) -> Inbound {
    let msg = match decode_message(raw.clone()) {
        Ok(msg) => msg,
        Err(error) => {
            let reset_id = peek_header(&raw)
                .filter(|h| h.version == 1 && h.mtype == MessageType::Confirmable)
                .map(|h| h.message_id);
            return Inbound::Malformed { error, reset_id };
        }
    };

    if msg.is_empty() {
        return match msg.mtype {
            MessageType::Confirmable => Inbound::Ping { message_id: msg.message_id },
            MessageType::Reset => Inbound::Reset { message_id: msg.message_id },
            MessageType::Acknowledgement => Inbound::Ack { message_id: msg.message_id },
            MessageType::NonConfirmable => Inbound::Ignored("empty NON"),
        };
    }

    if msg.code.is_request() {
        return match msg.mtype {
            MessageType::Confirmable | MessageType::NonConfirmable => Inbound::Request(msg),
            _ => Inbound::Ignored("request code in ACK/RST"),
        };
    }

    match msg.mtype {
        MessageType::Reset => Inbound::Reset { message_id: msg.message_id },
        MessageType::Acknowledgement => Inbound::Ack { message_id: msg.message_id },
        _ => Inbound::Ignored("response to a server that sends no requests"),
    }
}
