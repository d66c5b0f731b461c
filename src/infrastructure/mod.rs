//! Infrastructure - cold path only
//!
//! This module contains the ambient pieces the node layer sits on:
//! - Configuration management
//! - Logging
//! - Exported metric counters
//! - I/O buffer pooling

pub mod clock;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod pool;

pub use clock::now_millis;
pub use metrics::{CounterRegistry, NoopCounter, OperationCounter, TaggedCounter, INTERNAL_NODE_OPERATION};
pub use pool::{ByteBufferPool, ObjectPool};
