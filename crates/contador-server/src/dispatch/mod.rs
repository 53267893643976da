//! Request dispatch.
//!
//! Matches an inbound request against the registered resource and builds the
//! response (including Observe registration) without touching the network.

pub mod dispatcher;

pub use dispatcher::{handle_request, Resource};
