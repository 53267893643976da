use std::sync::Arc;

use bytes::Bytes;

use crate::context::Counter;
use crate::dispatch::Resource;

/// `/contador`: GET returns the decimal counter value.
pub struct CounterResource {
    path: String,
    counter: Arc<Counter>,
}

impl CounterResource {
    pub fn new(path: impl Into<String>, counter: Arc<Counter>) -> Self {
        Self {
            path: path.into(),
            counter,
        }
    }
}

impl Resource for CounterResource {
    fn path(&self) -> &str {
        &self.path
    }

    fn get(&self) -> Bytes {
        Bytes::from(self.counter.render())
    }
}
