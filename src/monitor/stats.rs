//! Read-only accessor surface polled by monitoring

use crate::core::{ServerGroup, Tag};
use serde::{Deserialize, Serialize};

/// Live node state exposed to a monitoring adapter
///
/// Every accessor is a point-in-time read with no side effect and may be
/// called concurrently with the data path.
pub trait NodeStats: Send + Sync {
    fn is_available(&self) -> bool;

    fn write_queue_size(&self) -> usize;

    fn read_queue_size(&self) -> usize;

    fn input_queue_size(&self) -> usize;

    fn operation_count(&self) -> u64;

    fn total_reconnect_count(&self) -> u32;

    /// Most recent connect time (Unix millis)
    fn create_time(&self) -> u64;

    /// Alias of [`NodeStats::create_time`]
    fn start_time(&self) -> u64 {
        self.create_time()
    }

    /// Start of the current timeout window (Unix millis, 0 = none)
    fn timeout_start_time(&self) -> u64;

    fn host_name(&self) -> &str;

    fn app_name(&self) -> &str;

    fn server_group(&self) -> &ServerGroup;

    fn node_id(&self) -> u32;

    fn tags(&self) -> &[Tag];

    /// Copy every accessor into an exportable snapshot
    fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            app_name: self.app_name().to_string(),
            server_group: self.server_group().clone(),
            node_id: self.node_id(),
            host_name: self.host_name().to_string(),
            available: self.is_available(),
            write_queue_size: self.write_queue_size(),
            read_queue_size: self.read_queue_size(),
            input_queue_size: self.input_queue_size(),
            operation_count: self.operation_count(),
            reconnect_count: self.total_reconnect_count(),
            start_time: self.start_time(),
            timeout_start_time: self.timeout_start_time(),
            tags: self.tags().to_vec(),
        }
    }
}

/// Exportable copy of a node's accessors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub app_name: String,
    pub server_group: ServerGroup,
    pub node_id: u32,
    pub host_name: String,
    pub available: bool,
    pub write_queue_size: usize,
    pub read_queue_size: usize,
    pub input_queue_size: usize,
    pub operation_count: u64,
    pub reconnect_count: u32,
    pub start_time: u64,
    pub timeout_start_time: u64,
    pub tags: Vec<Tag>,
}
