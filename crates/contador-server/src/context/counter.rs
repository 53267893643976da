use std::sync::atomic::{AtomicI32, Ordering};

/// The observable counter.
///
/// Single writer: only the notifier increments it. Readers (GET handler,
/// server handles) only load. Overflow wraps like a native `i32`.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI32,
}

impl Counter {
    pub fn new(initial: i32) -> Self {
        Self {
            value: AtomicI32::new(initial),
        }
    }

    pub fn value(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Add one and return the new value.
    pub fn increment(&self) -> i32 {
        self.value.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Decimal representation served to GET requests.
    pub fn render(&self) -> String {
        self.value().to_string()
    }
}
