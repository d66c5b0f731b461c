//! Per-connection node state
//!
//! - queue: bounded write/read/input operation queues
//! - metrics: lock-free counters and timestamps
//! - connection: liveness reported by the I/O layer
//! - buffers: pooled I/O buffers released on shutdown
//! - cache_node: the node itself

pub mod buffers;
pub mod cache_node;
pub mod connection;
pub mod metrics;
pub mod queue;

pub use buffers::{BufferError, IoBuffers, NoBuffers, PooledBuffers};
pub use cache_node::{CacheNode, CacheNodeBuilder};
pub use connection::{AlwaysActive, ConnectionState, ConnectionStatus, Liveness};
pub use metrics::{NodeMetrics, NodeMetricsSnapshot};
pub use queue::{OperationQueue, QueueError, QueueGuard, Rejected};
