//! Per-node counters and timestamps
//!
//! Lock-free: every field is an independent atomic, there is no invariant
//! spanning two fields.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Operation/reconnect counters plus connect and timeout timestamps
///
/// Timestamps are Unix millis; 0 means never recorded.
#[derive(Debug, Default)]
pub struct NodeMetrics {
    op_count: AtomicU64,
    reconnect_count: AtomicU32,
    connect_time: AtomicU64,
    timeout_start_time: AtomicU64,
}

/// Point-in-time copy of [`NodeMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetricsSnapshot {
    pub op_count: u64,
    pub reconnect_count: u32,
    pub connect_time: u64,
    pub timeout_start_time: u64,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed operation, returning the new total
    #[inline]
    pub fn record_operation(&self) -> u64 {
        self.op_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn operation_count(&self) -> u64 {
        self.op_count.load(Ordering::Relaxed)
    }

    /// Start a new connect epoch, returning the new reconnect count
    pub fn record_connect(&self, connect_time: u64) -> u32 {
        self.connect_time.store(connect_time, Ordering::Release);
        self.reconnect_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    pub fn connect_time(&self) -> u64 {
        self.connect_time.load(Ordering::Acquire)
    }

    #[inline]
    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::Acquire)
    }

    /// Record the start of the current timeout window
    pub fn set_timeout_start(&self, timestamp: u64) {
        self.timeout_start_time.store(timestamp, Ordering::Release);
    }

    #[inline]
    pub fn timeout_start_time(&self) -> u64 {
        self.timeout_start_time.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> NodeMetricsSnapshot {
        NodeMetricsSnapshot {
            op_count: self.operation_count(),
            reconnect_count: self.reconnect_count(),
            connect_time: self.connect_time(),
            timeout_start_time: self.timeout_start_time(),
        }
    }
}
