//! Soak driver for cache nodes
//!
//! Builds a few nodes against one monitoring registry, buffer pool and
//! counter table, then pushes operations through them:
//! - issuing threads enqueue onto each node's write queue
//! - one I/O thread moves write -> read -> completed and counts completions
//! - a background task polls monitoring
//!
//! Halfway through, node 0 goes through a reconnect. Every node is shut down
//! at the end and the exported counters are logged.

use cache_node::core::{NodeIdentity, OpKind, PendingOp, ServerGroup, Tag};
use cache_node::infrastructure::logging::init_logging;
use cache_node::infrastructure::{now_millis, ByteBufferPool, CounterRegistry, INTERNAL_NODE_OPERATION};
use cache_node::monitor::{InMemoryRegistry, MonitorPoller, MonitoringRegistry};
use cache_node::node::{CacheNode, ConnectionState, ConnectionStatus, PooledBuffers};
use cache_node::{log_node, Config, NodeError};
use crossbeam::channel::{self, Receiver, TryRecvError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Level;

const NODE_COUNT: u32 = 3;
const ISSUERS: usize = 4;
const DEFAULT_OPS_PER_ISSUER: u64 = 10_000;

type Node = Arc<CacheNode<PendingOp>>;

struct Cluster {
    nodes: Vec<Node>,
    statuses: Vec<Arc<ConnectionStatus>>,
}

fn build_cluster(
    config: &Config,
    registry: Arc<dyn MonitoringRegistry>,
    counters: &CounterRegistry,
    pool: &Arc<ByteBufferPool>,
) -> Cluster {
    let group = ServerGroup::new("us-east-1c", "sg-east");
    let mut nodes = Vec::new();
    let mut statuses = Vec::new();

    for id in 0..NODE_COUNT {
        let addr: SocketAddr = ([127, 0, 0, 1], 11211 + id as u16).into();
        let identity = NodeIdentity::new("soak", group.clone(), id, addr).with_tags(vec![
            Tag::new("app", "soak"),
            Tag::new("zone", &group.zone),
        ]);
        let status = Arc::new(ConnectionStatus::new(ConnectionState::Connected));

        let node = CacheNode::builder(identity.clone())
            .node_config(config.node.clone())
            .monitoring_config(config.monitoring.clone())
            .liveness(status.clone())
            .buffers(Box::new(PooledBuffers::lease(Arc::clone(pool))))
            .counter(counters.counter(INTERNAL_NODE_OPERATION, identity.tags()))
            .registry(Arc::clone(&registry))
            .build();

        nodes.push(node);
        statuses.push(status);
    }

    Cluster { nodes, statuses }
}

/// Issue `ops` operations round-robin across the nodes
fn issue(nodes: Vec<Node>, issuer: usize, ops: u64, rejected: Arc<AtomicU64>) {
    const KINDS: [OpKind; 4] = [OpKind::Get, OpKind::Set, OpKind::Touch, OpKind::Delete];

    for i in 0..ops {
        let node = &nodes[(i as usize + issuer) % nodes.len()];
        let op = PendingOp::new(KINDS[i as usize % KINDS.len()], format!("key-{}-{}", issuer, i), now_millis());
        if let Err(r) = node.enqueue_write(op) {
            rejected.fetch_add(1, Ordering::Relaxed);
            let reason = r.reason();
            let op = r.into_inner();
            log_node!(
                Level::DEBUG,
                host = node.identity().host_name(),
                op = op.kind.name(),
                write = op.kind.is_write(),
                reason = %reason,
                "enqueue rejected"
            );
        }
    }
}

/// Move operations write -> read -> completed until `stop` disconnects
fn dispatch(nodes: Vec<Node>, stop: Receiver<()>) {
    let mut batch = Vec::with_capacity(256);
    loop {
        let mut moved = 0;
        for node in &nodes {
            if !node.is_available() {
                continue;
            }
            node.write_queue().drain_into(&mut batch, 256);
            for op in batch.drain(..) {
                if let Err(r) = node.read_queue().offer(op) {
                    log_node!(Level::WARN, reason = %r.reason(), "read queue rejected in-flight op");
                }
            }
            while node.read_queue().poll().is_some() {
                node.increment_operation_count();
                moved += 1;
            }
        }

        if moved == 0 {
            match stop.try_recv() {
                Err(TryRecvError::Disconnected) => {
                    if nodes.iter().all(|n| n.write_queue_size() == 0 || !n.is_available()) {
                        return;
                    }
                }
                _ => thread::sleep(Duration::from_micros(200)),
            }
        }
    }
}

/// Simulated reconnect: drop staged work, start a new epoch, re-register
fn reconnect(node: &Node, status: &ConnectionStatus) {
    status.set_state(ConnectionState::Reconnecting);
    let dropped = node.flush_input_queue();
    thread::sleep(Duration::from_millis(5));

    let count = node.set_connect_time(now_millis());
    status.set_state(ConnectionState::Connected);
    node.register_for_monitoring();

    log_node!(
        Level::INFO,
        host = node.identity().host_name(),
        reconnect_count = count,
        dropped,
        "node reconnected"
    );
}

/// Run one batch of issuing threads to completion
async fn run_issuers(nodes: &[Node], ops: u64, rejected: &Arc<AtomicU64>) -> cache_node::Result<()> {
    let handles = (0..ISSUERS)
        .map(|issuer| {
            let nodes = nodes.to_vec();
            let rejected = Arc::clone(rejected);
            thread::Builder::new()
                .name(format!("issuer-{}", issuer))
                .spawn(move || issue(nodes, issuer, ops, rejected))
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    // Join off the runtime so the poller keeps ticking
    tokio::task::spawn_blocking(move || {
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("issuer thread panicked");
            }
        }
    })
    .await
    .map_err(|e| NodeError::Io(std::io::Error::other(e)))
}

async fn run(config: Config, ops_per_issuer: u64) -> cache_node::Result<()> {
    let registry = Arc::new(InMemoryRegistry::new(config.monitoring.registry_lock_timeout()));
    let counters = Arc::new(CounterRegistry::new());
    let pool = Arc::new(ByteBufferPool::with_buffer_size(
        config.node.buffer_pool_capacity,
        config.node.read_buffer_size.max(config.node.write_buffer_size),
    ));

    let cluster = build_cluster(&config, registry.clone(), &counters, &pool);
    tracing::info!(nodes = cluster.nodes.len(), registered = registry.len(), "cluster built");

    // Monitoring poll loop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = MonitorPoller::new(registry.clone(), config.monitoring.poll_interval());
    let poller_handle = tokio::spawn(poller.run(shutdown_rx));

    // Data path
    let rejected = Arc::new(AtomicU64::new(0));
    let (stop_tx, stop_rx) = channel::bounded::<()>(0);
    let dispatcher = {
        let nodes = cluster.nodes.clone();
        thread::Builder::new()
            .name("io-dispatch".into())
            .spawn(move || dispatch(nodes, stop_rx))?
    };

    let first_half = ops_per_issuer / 2;
    run_issuers(&cluster.nodes, first_half, &rejected).await?;

    reconnect(&cluster.nodes[0], &cluster.statuses[0]);

    run_issuers(&cluster.nodes, ops_per_issuer - first_half, &rejected).await?;

    drop(stop_tx);
    if dispatcher.join().is_err() {
        tracing::error!("dispatch thread panicked");
    }

    let polled = MonitorPoller::new(registry.clone(), config.monitoring.poll_interval()).poll_once();

    for node in &cluster.nodes {
        node.shutdown();
    }

    let _ = shutdown_tx.send(true);
    let polls = poller_handle.await.unwrap_or_default();

    let exported = serde_json::to_string(&counters.snapshot()).unwrap_or_default();
    tracing::info!(
        completed = cluster.nodes.iter().map(|n| n.operation_count()).sum::<u64>(),
        rejected = rejected.load(Ordering::Relaxed),
        polled,
        polls,
        registered_after_shutdown = registry.len(),
        pooled_buffers = pool.len(),
        counters = %exported,
        "soak finished"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let _guards = init_logging(&config.logging)?;

    let ops_per_issuer = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_OPS_PER_ISSUER);

    tokio::select! {
        result = run(config, ops_per_issuer) => result?,
        _ = tokio::signal::ctrl_c() => tracing::warn!("interrupted"),
    }

    Ok(())
}
