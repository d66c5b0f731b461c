//! Queued protocol operations
//!
//! The node layer treats operations as opaque handles; queues are generic over
//! the handle type. `PendingOp` is the handle used by the demo binary and the
//! benchmarks. Encoding lives in the protocol layer, not here.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OP_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of cache protocol operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Get,
    GetAndTouch,
    Set,
    Add,
    Replace,
    Append,
    Delete,
    Touch,
    Incr,
    Decr,
    Noop,
}

impl OpKind {
    /// Operation name for logging/metrics
    pub const fn name(&self) -> &'static str {
        match self {
            OpKind::Get => "get",
            OpKind::GetAndTouch => "gat",
            OpKind::Set => "set",
            OpKind::Add => "add",
            OpKind::Replace => "replace",
            OpKind::Append => "append",
            OpKind::Delete => "delete",
            OpKind::Touch => "touch",
            OpKind::Incr => "incr",
            OpKind::Decr => "decr",
            OpKind::Noop => "noop",
        }
    }

    /// Whether the operation mutates server state
    #[inline]
    pub const fn is_write(&self) -> bool {
        !matches!(self, OpKind::Get | OpKind::GetAndTouch | OpKind::Noop)
    }
}

/// A protocol operation waiting in one of the node queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOp {
    pub id: u64,
    pub kind: OpKind,
    pub key: String,
    /// Enqueue time (Unix millis)
    pub enqueued_at: u64,
}

impl PendingOp {
    /// Create a new operation with a process-unique id
    pub fn new(kind: OpKind, key: impl Into<String>, enqueued_at: u64) -> Self {
        Self {
            id: NEXT_OP_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            key: key.into(),
            enqueued_at,
        }
    }
}
