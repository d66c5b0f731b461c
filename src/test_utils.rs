//! Shared fixtures for unit tests

use crate::core::{MonitorName, NodeIdentity, ServerGroup, Tag, DEFAULT_MONITOR_DOMAIN};
use crate::monitor::registry::{InMemoryRegistry, MonitorError, MonitoringRegistry};
use crate::monitor::stats::{NodeSnapshot, NodeStats};
use crate::node::buffers::{BufferError, IoBuffers};
use crate::node::CacheNode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Identity used throughout the tests: cache1 / sg-east / 3 / 10.0.0.5
pub fn identity() -> NodeIdentity {
    NodeIdentity::new(
        "cache1",
        ServerGroup::new("us-east-1c", "sg-east"),
        3,
        "10.0.0.5:11211".parse().unwrap(),
    )
    .with_tags(vec![Tag::new("app", "cache1"), Tag::new("zone", "us-east-1c")])
}

/// Monitoring name of [`identity`] at `connect_time`
pub fn monitor_name(connect_time: u64) -> MonitorName {
    MonitorName::render(DEFAULT_MONITOR_DOMAIN, &identity(), connect_time).unwrap()
}

/// Node without monitoring side effects
pub fn test_node(connect_time: u64) -> Arc<CacheNode<u64>> {
    CacheNode::builder(identity()).connect_time(connect_time).build()
}

/// Node registered with `registry` on build
pub fn node_with_registry(
    registry: Arc<dyn MonitoringRegistry>,
    connect_time: u64,
) -> Arc<CacheNode<u64>> {
    CacheNode::builder(identity())
        .registry(registry)
        .connect_time(connect_time)
        .build()
}

/// Fixed accessor values
pub struct StaticStats {
    app_name: String,
    server_group: ServerGroup,
    node_id: u32,
    host_name: String,
}

impl StaticStats {
    pub fn new(app_name: &str, server_group: &str, node_id: u32, host_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            server_group: ServerGroup::new("us-east-1c", server_group),
            node_id,
            host_name: host_name.to_string(),
        }
    }
}

impl NodeStats for StaticStats {
    fn is_available(&self) -> bool {
        true
    }

    fn write_queue_size(&self) -> usize {
        0
    }

    fn read_queue_size(&self) -> usize {
        0
    }

    fn input_queue_size(&self) -> usize {
        0
    }

    fn operation_count(&self) -> u64 {
        0
    }

    fn total_reconnect_count(&self) -> u32 {
        1
    }

    fn create_time(&self) -> u64 {
        1000
    }

    fn timeout_start_time(&self) -> u64 {
        0
    }

    fn host_name(&self) -> &str {
        &self.host_name
    }

    fn app_name(&self) -> &str {
        &self.app_name
    }

    fn server_group(&self) -> &ServerGroup {
        &self.server_group
    }

    fn node_id(&self) -> u32 {
        self.node_id
    }

    fn tags(&self) -> &[Tag] {
        &[]
    }
}

/// Registry that counts calls and can be made to fail every call
pub struct RecordingRegistry {
    inner: InMemoryRegistry,
    fail: bool,
    calls: AtomicUsize,
}

impl RecordingRegistry {
    pub fn failing() -> Self {
        Self {
            inner: InMemoryRegistry::default(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> Result<(), MonitorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MonitorError::Unavailable("registry down".to_string()));
        }
        Ok(())
    }
}

impl MonitoringRegistry for RecordingRegistry {
    fn is_registered(&self, name: &MonitorName) -> Result<bool, MonitorError> {
        self.call()?;
        self.inner.is_registered(name)
    }

    fn register(&self, name: &MonitorName, target: Arc<dyn NodeStats>) -> Result<(), MonitorError> {
        self.call()?;
        self.inner.register(name, target)
    }

    fn unregister(&self, name: &MonitorName) -> Result<(), MonitorError> {
        self.call()?;
        self.inner.unregister(name)
    }

    fn snapshots(&self) -> Vec<(MonitorName, NodeSnapshot)> {
        self.inner.snapshots()
    }
}

/// Buffers whose release always fails
pub struct FailingBuffers;

impl IoBuffers for FailingBuffers {
    fn release(&mut self) -> Result<(), BufferError> {
        Err(BufferError::ReleaseFailed("cleaner unavailable".to_string()))
    }

    fn is_held(&self) -> bool {
        true
    }
}
