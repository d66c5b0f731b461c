//! Monitoring side channel
//!
//! - stats: the read-only accessor surface a node exposes
//! - registry: where nodes register under their per-epoch names
//! - poller: background task reporting registered nodes

pub mod poller;
pub mod registry;
pub mod stats;

pub use poller::MonitorPoller;
pub use registry::{InMemoryRegistry, MonitorError, MonitoringRegistry, NoopRegistry};
pub use stats::{NodeSnapshot, NodeStats};
