//! Per-node connection health and operation tracking for a cache client
//!
//! One `CacheNode` exists per connection to a remote cache server. It owns the
//! node's operation queues and counters and exposes them to monitoring.

pub mod core;
pub mod infrastructure;
pub mod monitor;
pub mod node;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use crate::core::{MonitorName, NodeIdentity, OpKind, PendingOp, ServerGroup, Tag};
pub use infrastructure::config::{Config, LoggingConfig, MonitoringConfig, NodeConfig};
pub use monitor::{InMemoryRegistry, MonitoringRegistry, NodeSnapshot, NodeStats, NoopRegistry};
pub use node::{CacheNode, CacheNodeBuilder, NodeMetrics, OperationQueue, QueueError};

use thiserror::Error;

/// Main error type for the node layer
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Queue error: {0}")]
    Queue(#[from] node::QueueError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] node::BufferError),

    #[error("Monitoring error: {0}")]
    Monitor(#[from] monitor::MonitorError),

    #[error("Configuration error: {0}")]
    Config(#[from] infrastructure::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl<T> From<node::Rejected<T>> for NodeError {
    fn from(rejected: node::Rejected<T>) -> Self {
        NodeError::Queue(rejected.reason())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, NodeError>;
