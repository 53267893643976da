//! Observe (RFC 7641) runtime: observer set per resource plus the periodic
//! notifier that increments the counter and fans notifications out.

mod notifier;
mod registry;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use contador_core::protocol::option::OBSERVE_SEQ_MASK;

use crate::dispatch::Resource;

pub use notifier::{Notifier, NotifyOutcome};
pub use registry::{ObserverKey, ObserverRegistry, Registration};

/// A registered resource together with its observers.
pub struct ObservedResource {
    resource: Arc<dyn Resource>,
    observers: Arc<ObserverRegistry>,
    seq: AtomicU32,
}

impl ObservedResource {
    pub fn new(resource: Arc<dyn Resource>, observers: Arc<ObserverRegistry>) -> Self {
        Self {
            resource,
            observers,
            seq: AtomicU32::new(0),
        }
    }

    pub fn path(&self) -> &str {
        self.resource.path()
    }

    pub fn resource(&self) -> &dyn Resource {
        self.resource.as_ref()
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub fn content_format(&self) -> u32 {
        self.resource.content_format()
    }

    pub fn get(&self) -> bytes::Bytes {
        self.resource.get()
    }

    /// Observe sequence number of the latest notification.
    pub fn current_seq(&self) -> u32 {
        self.seq.load(Ordering::Relaxed) & OBSERVE_SEQ_MASK
    }

    /// Advance the 24-bit sequence number for a new notification.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1) & OBSERVE_SEQ_MASK
    }
}
