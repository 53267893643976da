//! Transport layer (CoAP over UDP).
//!
//! Exposes the server task and the codec that classifies each datagram once
//! before it reaches dispatch.

pub mod codec;
pub mod udp;

pub use udp::{run_server_task, CoapServer, ServerHandle};
