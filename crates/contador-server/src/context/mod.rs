//! State owned by the server task.
//!
//! The counter and the server context are explicit values handed to the
//! request handler and the notifier instead of process-wide statics.

mod counter;
mod server;

pub use counter::Counter;
pub use server::{Lifecycle, ServerContext, ServerState};
