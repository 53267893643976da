//! Built-in resources.

pub mod counter;

pub use counter::CounterResource;
