//! Helpers shared by unit and integration tests.
//!
//! Compiled for the crate's own tests and, through the `test-util` feature,
//! for the integration tests under `tests/`.

pub mod collecting_sink;
pub mod collector;

pub use collecting_sink::CollectingSink;
pub use collector::{ObservedEvent, TestCollector, unused_port};
