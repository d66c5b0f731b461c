//! Metric counters exported to the metrics backend
//!
//! Lock-free counters using atomic operations. Incremented on the hot path,
//! read via snapshots by whatever exporter polls the registry.

use crate::core::Tag;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metric name of the per-node operation counter
pub const INTERNAL_NODE_OPERATION: &str = "internal.evc.client.node.operation";

/// Counter incremented once per completed operation
pub trait OperationCounter: Send + Sync {
    fn increment(&self);
}

/// Atomic counter identified by metric name and tag set
#[derive(Debug)]
pub struct TaggedCounter {
    name: String,
    tags: Vec<Tag>,
    count: AtomicU64,
}

impl TaggedCounter {
    pub fn new(name: impl Into<String>, mut tags: Vec<Tag>) -> Self {
        tags.sort();
        Self {
            name: name.into(),
            tags,
            count: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

impl OperationCounter for TaggedCounter {
    #[inline]
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counter that discards increments
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounter;

impl OperationCounter for NoopCounter {
    #[inline]
    fn increment(&self) {}
}

/// Exported counter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub name: String,
    pub tags: Vec<Tag>,
    pub count: u64,
}

type CounterKey = (String, Vec<Tag>);

/// Process-wide table of tagged counters
///
/// Counters are created on first use and shared afterwards, so every node
/// with the same tag set feeds the same counter.
#[derive(Default)]
pub struct CounterRegistry {
    counters: RwLock<HashMap<CounterKey, Arc<TaggedCounter>>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the counter for `name` + `tags`
    pub fn counter(&self, name: &str, tags: &[Tag]) -> Arc<TaggedCounter> {
        let mut sorted = tags.to_vec();
        sorted.sort();
        let key = (name.to_string(), sorted);

        if let Some(counter) = self.counters.read().get(&key) {
            return Arc::clone(counter);
        }

        let mut counters = self.counters.write();
        Arc::clone(
            counters
                .entry(key)
                .or_insert_with_key(|(name, tags)| {
                    Arc::new(TaggedCounter::new(name.clone(), tags.clone()))
                }),
        )
    }

    /// Point-in-time values of every counter, ordered by name then tags
    pub fn snapshot(&self) -> Vec<CounterSnapshot> {
        let mut out: Vec<CounterSnapshot> = self
            .counters
            .read()
            .values()
            .map(|c| CounterSnapshot {
                name: c.name().to_string(),
                tags: c.tags().to_vec(),
                count: c.count(),
            })
            .collect();
        out.sort_by(|a, b| (&a.name, &a.tags).cmp(&(&b.name, &b.tags)));
        out
    }

    pub fn len(&self) -> usize {
        self.counters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_counter_shared_by_tag_set() {
        let registry = CounterRegistry::new();
        let a = registry.counter(
            INTERNAL_NODE_OPERATION,
            &[Tag::new("app", "cache1"), Tag::new("zone", "c")],
        );
        // Same tags, different order
        let b = registry.counter(
            INTERNAL_NODE_OPERATION,
            &[Tag::new("zone", "c"), Tag::new("app", "cache1")],
        );
        a.increment();
        b.increment();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.count(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_tags_distinct_counters() {
        let registry = CounterRegistry::new();
        registry.counter(INTERNAL_NODE_OPERATION, &[Tag::new("app", "a")]).increment();
        registry.counter(INTERNAL_NODE_OPERATION, &[Tag::new("app", "b")]);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].tags, vec![Tag::new("app", "a")]);
        assert_eq!(snapshot[0].count, 1);
        assert_eq!(snapshot[1].count, 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let counter = Arc::new(TaggedCounter::new("ops", Vec::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.count(), 8000);
    }
}
