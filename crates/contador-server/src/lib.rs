//! contador server library entry.
//!
//! This crate wires the UDP transport, request dispatch, the observable
//! counter resource and the periodic notifier into one server task. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod observe;
pub mod services;
pub mod transport;

pub use error::ServerError;
pub use transport::{run_server_task, CoapServer, ServerHandle};
