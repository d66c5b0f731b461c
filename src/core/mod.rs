//! Core value types shared by the node and monitoring layers
//!
//! - NodeIdentity: immutable who-am-I of a node (app, server group, id, host, tags)
//! - MonitorName: deterministic per-epoch monitoring name
//! - PendingOp: opaque queued protocol operation

pub mod identity;
pub mod operation;

pub use identity::{InvalidMonitorName, MonitorName, NodeIdentity, ServerGroup, Tag, DEFAULT_MONITOR_DOMAIN};
pub use operation::{OpKind, PendingOp};
