//! Client-side representation of one connection to one cache server
//!
//! A `CacheNode` owns the connection's three operation queues (write, read,
//! input), its counters and timestamps, and its I/O buffers. It is polled by
//! monitoring concurrently with the issuing threads and the I/O thread.
//!
//! Lifecycle: built once per connection by the owning pool; the pool calls
//! [`CacheNode::set_connect_time`] on every successful reconnect and
//! [`CacheNode::shutdown`] exactly once when the connection is retired.
//! Monitoring calls are best-effort and never fail the data path.

use crate::core::{InvalidMonitorName, MonitorName, NodeIdentity, ServerGroup, Tag};
use crate::infrastructure::clock::now_millis;
use crate::infrastructure::config::{MonitoringConfig, NodeConfig};
use crate::infrastructure::metrics::{NoopCounter, OperationCounter};
use crate::monitor::registry::{MonitorError, MonitoringRegistry, NoopRegistry};
use crate::monitor::stats::NodeStats;
use crate::node::buffers::{IoBuffers, NoBuffers};
use crate::node::connection::{AlwaysActive, Liveness};
use crate::node::metrics::{NodeMetrics, NodeMetricsSnapshot};
use crate::node::queue::{OperationQueue, Rejected};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;

/// One connection to one remote cache server
pub struct CacheNode<T> {
    identity: NodeIdentity,
    write_queue: OperationQueue<T>,
    read_queue: OperationQueue<T>,
    input_queue: OperationQueue<T>,
    metrics: NodeMetrics,
    liveness: Arc<dyn Liveness>,
    buffers: Mutex<Box<dyn IoBuffers>>,
    counter: Arc<dyn OperationCounter>,
    registry: Arc<dyn MonitoringRegistry>,
    monitor_domain: String,
    /// Name this node is currently registered under
    registered_name: Mutex<Option<MonitorName>>,
    shut_down: AtomicBool,
}

impl<T: Send + 'static> CacheNode<T> {
    /// Start building a node for `identity`
    pub fn builder(identity: NodeIdentity) -> CacheNodeBuilder<T> {
        CacheNodeBuilder::new(identity)
    }

    #[inline]
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// True iff the underlying connection is currently active
    #[inline]
    pub fn is_available(&self) -> bool {
        self.liveness.is_active()
    }

    /// Count one completed operation, returning the new total
    ///
    /// Also feeds the exported operation counter.
    #[inline]
    pub fn increment_operation_count(&self) -> u64 {
        self.counter.increment();
        self.metrics.record_operation()
    }

    #[inline]
    pub fn operation_count(&self) -> u64 {
        self.metrics.operation_count()
    }

    /// Queue sizes are advisory; they may be stale as soon as they return
    #[inline]
    pub fn write_queue_size(&self) -> usize {
        self.write_queue.len()
    }

    #[inline]
    pub fn read_queue_size(&self) -> usize {
        self.read_queue.len()
    }

    #[inline]
    pub fn input_queue_size(&self) -> usize {
        self.input_queue.len()
    }

    /// Work not yet sent
    pub fn write_queue(&self) -> &OperationQueue<T> {
        &self.write_queue
    }

    /// Work sent and awaiting a response
    pub fn read_queue(&self) -> &OperationQueue<T> {
        &self.read_queue
    }

    /// Work staged for future dispatch
    pub fn input_queue(&self) -> &OperationQueue<T> {
        &self.input_queue
    }

    /// Queue an operation for sending
    pub fn enqueue_write(&self, op: T) -> Result<(), Rejected<T>> {
        self.write_queue.offer(op)
    }

    /// Stage an operation for later dispatch
    pub fn enqueue_input(&self, op: T) -> Result<(), Rejected<T>> {
        self.input_queue.offer(op)
    }

    /// Drop every staged operation without delivering it
    ///
    /// Returns how many were dropped; an empty queue is a no-op.
    pub fn flush_input_queue(&self) -> usize {
        let dropped = self.input_queue.clear();
        if dropped > 0 {
            crate::log_node!(
                Level::DEBUG,
                host = %self.identity.host_name(),
                dropped,
                "flushed input queue"
            );
        }
        dropped
    }

    /// Start a new connect epoch
    ///
    /// Call once per successful connect/reconnect, never on a failed attempt.
    /// Returns the new reconnect count.
    pub fn set_connect_time(&self, connect_time: u64) -> u32 {
        let count = self.metrics.record_connect(connect_time);
        crate::log_node!(
            Level::DEBUG,
            host = %self.identity.host_name(),
            connect_time,
            reconnect_count = count,
            "connect epoch started"
        );
        count
    }

    /// Most recent connect time (Unix millis)
    #[inline]
    pub fn create_time(&self) -> u64 {
        self.metrics.connect_time()
    }

    /// Alias of [`CacheNode::create_time`]
    #[inline]
    pub fn start_time(&self) -> u64 {
        self.metrics.connect_time()
    }

    /// Record the start of the current timeout window
    pub fn set_timeout_start_time(&self, timestamp: u64) {
        self.metrics.set_timeout_start(timestamp);
    }

    #[inline]
    pub fn timeout_start_time(&self) -> u64 {
        self.metrics.timeout_start_time()
    }

    #[inline]
    pub fn total_reconnect_count(&self) -> u32 {
        self.metrics.reconnect_count()
    }

    pub fn metrics(&self) -> NodeMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Monitoring name for the current connect epoch
    pub fn monitor_name(&self) -> Result<MonitorName, InvalidMonitorName> {
        MonitorName::render(&self.monitor_domain, &self.identity, self.create_time())
    }

    /// Name this node is registered under, if any
    pub fn registered_name(&self) -> Option<MonitorName> {
        self.registered_name.lock().clone()
    }

    /// Register with monitoring under the current epoch's name
    ///
    /// A stale registration under the same name is replaced, and this node's
    /// own registration from an earlier epoch is dropped. Failures are logged
    /// and swallowed; returns whether the node is now registered.
    pub fn register_for_monitoring(self: &Arc<Self>) -> bool {
        match self.try_register() {
            Ok(name) => {
                crate::log_monitor!(Level::DEBUG, monitor_name = %name, "registered for monitoring");
                true
            }
            Err(e) => {
                crate::log_monitor!(
                    Level::DEBUG,
                    host = %self.identity.host_name(),
                    error = %e,
                    "failed to set up monitoring"
                );
                false
            }
        }
    }

    fn try_register(self: &Arc<Self>) -> Result<MonitorName, MonitorError> {
        let name = self.monitor_name()?;
        let mut registered = self.registered_name.lock();
        // Checked under the lock shutdown takes, so a retired node stays out
        if self.is_shut_down() {
            return Err(MonitorError::ShutDown);
        }

        if let Some(previous) = registered.take() {
            if previous != name {
                if let Err(e) = self.registry.unregister(&previous) {
                    crate::log_monitor!(
                        Level::DEBUG,
                        monitor_name = %previous,
                        error = %e,
                        "failed to drop previous epoch registration"
                    );
                }
            }
        }

        if self.registry.is_registered(&name)? {
            crate::log_monitor!(
                Level::DEBUG,
                monitor_name = %name,
                "name already registered, replacing previous instance"
            );
            self.registry.unregister(&name)?;
        }

        let target: Arc<dyn NodeStats> = Arc::clone(self) as Arc<dyn NodeStats>;
        self.registry.register(&name, target)?;
        *registered = Some(name.clone());
        Ok(name)
    }

    /// Remove this node's registration
    ///
    /// Only the name this node registered is removed, so a newer epoch's
    /// registration survives. Failures are logged and swallowed; returns
    /// whether a registration was removed.
    pub fn unregister_from_monitoring(&self) -> bool {
        let mut registered = self.registered_name.lock();
        self.unregister_locked(&mut registered)
    }

    fn unregister_locked(&self, registered: &mut Option<MonitorName>) -> bool {
        let Some(name) = registered.take() else {
            return false;
        };

        let result = self
            .registry
            .is_registered(&name)
            .and_then(|present| if present { self.registry.unregister(&name).map(|_| true) } else { Ok(false) });

        match result {
            Ok(removed) => {
                crate::log_monitor!(Level::DEBUG, monitor_name = %name, removed, "unregistered from monitoring");
                removed
            }
            Err(e) => {
                crate::log_monitor!(
                    Level::DEBUG,
                    monitor_name = %name,
                    error = %e,
                    "failed to remove monitoring"
                );
                false
            }
        }
    }

    /// Retire the node
    ///
    /// Unregisters from monitoring, then closes and clears all three queues
    /// and releases the I/O buffers while enqueues are held off. A buffer
    /// release failure is logged; the queues are cleared regardless. Runs at
    /// most once; accessors keep answering afterwards.
    pub fn shutdown(&self) {
        {
            let mut registered = self.registered_name.lock();
            if self.shut_down.swap(true, Ordering::AcqRel) {
                crate::log_node!(Level::DEBUG, host = %self.identity.host_name(), "node already shut down");
                return;
            }
            self.unregister_locked(&mut registered);
        }

        let (dropped_write, dropped_read, dropped_input) = {
            // Fixed order: write, read, input
            let write = self.write_queue.lock_exclusive();
            let read = self.read_queue.lock_exclusive();
            let input = self.input_queue.lock_exclusive();

            write.close();
            read.close();
            input.close();
            let dropped = (write.clear(), read.clear(), input.clear());

            if let Err(e) = self.buffers.lock().release() {
                crate::log_node!(
                    Level::ERROR,
                    host = %self.identity.host_name(),
                    error = %e,
                    "failed to release I/O buffers"
                );
            }
            dropped
        };

        crate::log_node!(
            Level::INFO,
            app = %self.identity.app_name(),
            host = %self.identity.host_name(),
            ops = self.operation_count(),
            dropped_write,
            dropped_read,
            dropped_input,
            "node shut down"
        );
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> NodeStats for CacheNode<T> {
    fn is_available(&self) -> bool {
        CacheNode::is_available(self)
    }

    fn write_queue_size(&self) -> usize {
        CacheNode::write_queue_size(self)
    }

    fn read_queue_size(&self) -> usize {
        CacheNode::read_queue_size(self)
    }

    fn input_queue_size(&self) -> usize {
        CacheNode::input_queue_size(self)
    }

    fn operation_count(&self) -> u64 {
        CacheNode::operation_count(self)
    }

    fn total_reconnect_count(&self) -> u32 {
        CacheNode::total_reconnect_count(self)
    }

    fn create_time(&self) -> u64 {
        CacheNode::create_time(self)
    }

    fn timeout_start_time(&self) -> u64 {
        CacheNode::timeout_start_time(self)
    }

    fn host_name(&self) -> &str {
        self.identity.host_name()
    }

    fn app_name(&self) -> &str {
        self.identity.app_name()
    }

    fn server_group(&self) -> &ServerGroup {
        self.identity.server_group()
    }

    fn node_id(&self) -> u32 {
        self.identity.node_id()
    }

    fn tags(&self) -> &[Tag] {
        self.identity.tags()
    }
}

impl<T> fmt::Debug for CacheNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheNode")
            .field("app", &self.identity.app_name())
            .field("server_group", &self.identity.server_group().name)
            .field("node_id", &self.identity.node_id())
            .field("host", &self.identity.host_name())
            .field("metrics", &self.metrics.snapshot())
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}

/// Builder for [`CacheNode`]
pub struct CacheNodeBuilder<T> {
    identity: NodeIdentity,
    node_config: NodeConfig,
    monitoring: MonitoringConfig,
    liveness: Option<Arc<dyn Liveness>>,
    buffers: Option<Box<dyn IoBuffers>>,
    counter: Option<Arc<dyn OperationCounter>>,
    registry: Option<Arc<dyn MonitoringRegistry>>,
    connect_time: Option<u64>,
    _ops: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> CacheNodeBuilder<T> {
    pub fn new(identity: NodeIdentity) -> Self {
        Self {
            identity,
            node_config: NodeConfig::default(),
            monitoring: MonitoringConfig::default(),
            liveness: None,
            buffers: None,
            counter: None,
            registry: None,
            connect_time: None,
            _ops: PhantomData,
        }
    }

    /// Queue capacities and enqueue block time
    pub fn node_config(mut self, config: NodeConfig) -> Self {
        self.node_config = config;
        self
    }

    /// Monitoring domain and on/off switch
    pub fn monitoring_config(mut self, config: MonitoringConfig) -> Self {
        self.monitoring = config;
        self
    }

    /// Connection liveness (defaults to always active)
    pub fn liveness(mut self, liveness: Arc<dyn Liveness>) -> Self {
        self.liveness = Some(liveness);
        self
    }

    /// I/O buffers released on shutdown (defaults to none)
    pub fn buffers(mut self, buffers: Box<dyn IoBuffers>) -> Self {
        self.buffers = Some(buffers);
        self
    }

    /// Exported operation counter (defaults to a no-op)
    pub fn counter(mut self, counter: Arc<dyn OperationCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Monitoring registry (defaults to a no-op)
    pub fn registry(mut self, registry: Arc<dyn MonitoringRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Initial connect time (defaults to now)
    pub fn connect_time(mut self, connect_time: u64) -> Self {
        self.connect_time = Some(connect_time);
        self
    }

    /// Build the node, start its first connect epoch and, if enabled,
    /// register it for monitoring
    pub fn build(self) -> Arc<CacheNode<T>> {
        let block = self.node_config.op_queue_max_block_time();
        let node = Arc::new(CacheNode {
            write_queue: OperationQueue::new("write", self.node_config.write_queue_capacity, block),
            read_queue: OperationQueue::new("read", self.node_config.read_queue_capacity, block),
            input_queue: OperationQueue::new("input", self.node_config.input_queue_capacity, block),
            metrics: NodeMetrics::new(),
            liveness: self.liveness.unwrap_or_else(|| Arc::new(AlwaysActive)),
            buffers: Mutex::new(self.buffers.unwrap_or_else(|| Box::new(NoBuffers))),
            counter: self.counter.unwrap_or_else(|| Arc::new(NoopCounter)),
            registry: self.registry.unwrap_or_else(|| Arc::new(NoopRegistry)),
            monitor_domain: self.monitoring.domain,
            registered_name: Mutex::new(None),
            shut_down: AtomicBool::new(false),
            identity: self.identity,
        });

        node.set_connect_time(self.connect_time.unwrap_or_else(now_millis));

        if self.monitoring.enabled {
            node.register_for_monitoring();
        }

        crate::log_node!(
            Level::INFO,
            app = %node.identity.app_name(),
            server_group = %node.identity.server_group(),
            node_id = node.identity.node_id(),
            host = %node.identity.host_name(),
            "node created"
        );
        node
    }
}
