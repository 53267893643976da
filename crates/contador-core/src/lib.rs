//! contador core: transport-agnostic CoAP primitives and error types.
//!
//! This crate defines the wire-level message model (RFC 7252), the codec and
//! the error surface shared by the server and its tests. It carries no
//! transport or runtime dependencies so it can be reused by clients and tools.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `CoapError`/`Result` so a malformed
//! datagram can never bring the server down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{CoapError, Result};
