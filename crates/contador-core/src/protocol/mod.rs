//! CoAP protocol modules (RFC 7252 with the RFC 7641 Observe option).
//!
//! - `code`: message codes (`c.dd`) and request methods.
//! - `message`: the in-memory message model plus option accessors.
//! - `option`: option numbers and uint option encoding.
//! - `codec`: datagram <-> `Message` conversion.
//!
//! All parsers are panic-free: malformed input is reported as `CoapError`
//! instead of panicking or indexing raw buffers.

pub mod code;
pub mod codec;
pub mod message;
pub mod option;

pub use code::{Code, Method};
pub use codec::{decode_message, encode_message};
pub use message::{CoapOption, Message, MessageType};
