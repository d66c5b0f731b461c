//! Monitoring registry contract and implementations
//!
//! Nodes register themselves under a per-epoch name. Registration is a side
//! channel: callers log and swallow every error returned from here.

use crate::core::{InvalidMonitorName, MonitorName};
use crate::monitor::stats::{NodeSnapshot, NodeStats};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Errors that can occur talking to a monitoring registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    #[error("Already registered: {0}")]
    AlreadyRegistered(MonitorName),
    #[error("Not registered: {0}")]
    NotRegistered(MonitorName),
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    InvalidName(#[from] InvalidMonitorName),
    #[error("Node is shut down")]
    ShutDown,
}

/// Registry a monitoring adapter exposes to nodes
pub trait MonitoringRegistry: Send + Sync {
    fn is_registered(&self, name: &MonitorName) -> Result<bool, MonitorError>;

    fn register(&self, name: &MonitorName, target: Arc<dyn NodeStats>) -> Result<(), MonitorError>;

    fn unregister(&self, name: &MonitorName) -> Result<(), MonitorError>;

    /// Poll every live registered node
    ///
    /// Registries that forward elsewhere have nothing to poll.
    fn snapshots(&self) -> Vec<(MonitorName, NodeSnapshot)> {
        Vec::new()
    }
}

/// Process-local registry table
///
/// Holds weak references, so a registration never keeps a node alive. Lock
/// waits are bounded; a contended registry reports `Unavailable` instead of
/// stalling the caller.
pub struct InMemoryRegistry {
    entries: RwLock<BTreeMap<MonitorName, Weak<dyn NodeStats>>>,
    lock_timeout: Duration,
}

impl InMemoryRegistry {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            lock_timeout,
        }
    }

    /// Number of registrations, live or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered names in order
    pub fn names(&self) -> Vec<MonitorName> {
        self.entries.read().keys().cloned().collect()
    }

    /// Drop registrations whose node has been freed, returning how many
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, target| target.strong_count() > 0);
        before - entries.len()
    }

    fn unavailable(&self) -> MonitorError {
        MonitorError::Unavailable(format!("registry lock not acquired within {:?}", self.lock_timeout))
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl MonitoringRegistry for InMemoryRegistry {
    fn is_registered(&self, name: &MonitorName) -> Result<bool, MonitorError> {
        let entries = self
            .entries
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable())?;
        Ok(entries.contains_key(name))
    }

    fn register(&self, name: &MonitorName, target: Arc<dyn NodeStats>) -> Result<(), MonitorError> {
        let mut entries = self
            .entries
            .try_write_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable())?;
        if entries.contains_key(name) {
            return Err(MonitorError::AlreadyRegistered(name.clone()));
        }
        entries.insert(name.clone(), Arc::downgrade(&target));
        Ok(())
    }

    fn unregister(&self, name: &MonitorName) -> Result<(), MonitorError> {
        let mut entries = self
            .entries
            .try_write_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable())?;
        entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MonitorError::NotRegistered(name.clone()))
    }

    fn snapshots(&self) -> Vec<(MonitorName, NodeSnapshot)> {
        // Upgrade under the lock, poll outside it
        let live: Vec<(MonitorName, Arc<dyn NodeStats>)> = match self.entries.try_read_for(self.lock_timeout) {
            Some(entries) => entries
                .iter()
                .filter_map(|(name, target)| target.upgrade().map(|t| (name.clone(), t)))
                .collect(),
            None => return Vec::new(),
        };

        live.into_iter()
            .map(|(name, target)| (name, target.snapshot()))
            .collect()
    }
}

/// Registry that accepts everything and keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistry;

impl MonitoringRegistry for NoopRegistry {
    fn is_registered(&self, _name: &MonitorName) -> Result<bool, MonitorError> {
        Ok(false)
    }

    fn register(&self, _name: &MonitorName, _target: Arc<dyn NodeStats>) -> Result<(), MonitorError> {
        Ok(())
    }

    fn unregister(&self, _name: &MonitorName) -> Result<(), MonitorError> {
        Ok(())
    }
}
