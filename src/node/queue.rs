//! Bounded operation queues
//!
//! Lock-free MPMC FIFO over `crossbeam_queue::ArrayQueue`. Enqueue either
//! fails fast on a full queue or spins with backoff up to a configured block
//! time. A shared/exclusive gate keeps enqueues from interleaving with a
//! clear, which is what shutdown relies on before it releases I/O buffers.

use crossbeam_queue::ArrayQueue;
use crossbeam_utils::Backoff;
use parking_lot::{RwLock, RwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Why an enqueue was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue full")]
    Full,
    #[error("Queue still full after {0:?}")]
    Timeout(Duration),
    #[error("Queue closed")]
    Closed,
}

/// A rejected operation, handed back to the caller
pub struct Rejected<T> {
    reason: QueueError,
    op: T,
}

impl<T> Rejected<T> {
    fn new(reason: QueueError, op: T) -> Self {
        Self { reason, op }
    }

    #[inline]
    pub fn reason(&self) -> QueueError {
        self.reason
    }

    /// Take back the operation that could not be queued
    #[inline]
    pub fn into_inner(self) -> T {
        self.op
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected").field("reason", &self.reason).finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation rejected: {}", self.reason)
    }
}

impl<T> std::error::Error for Rejected<T> {}

impl<T> From<Rejected<T>> for QueueError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.reason
    }
}

/// Bounded multi-producer/multi-consumer queue of pending operations
pub struct OperationQueue<T> {
    name: &'static str,
    ops: ArrayQueue<T>,
    /// Shared for enqueue, exclusive for clear/close
    gate: RwLock<()>,
    closed: AtomicBool,
    max_block_time: Option<Duration>,
}

impl<T> OperationQueue<T> {
    /// Create a queue holding at most `capacity` operations (at least 1)
    ///
    /// With `max_block_time = None` a full queue rejects immediately.
    pub fn new(name: &'static str, capacity: usize, max_block_time: Option<Duration>) -> Self {
        Self {
            name,
            ops: ArrayQueue::new(capacity.max(1)),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
            max_block_time,
        }
    }

    /// Enqueue an operation, blocking up to the configured max block time
    pub fn offer(&self, op: T) -> Result<(), Rejected<T>> {
        let mut op = match self.try_offer(op) {
            Err(r) if r.reason == QueueError::Full => r.into_inner(),
            other => return other,
        };

        let Some(max_block) = self.max_block_time else {
            return Err(Rejected::new(QueueError::Full, op));
        };

        let deadline = Instant::now() + max_block;
        let backoff = Backoff::new();
        loop {
            if Instant::now() >= deadline {
                return Err(Rejected::new(QueueError::Timeout(max_block), op));
            }
            if backoff.is_completed() {
                thread::sleep(Duration::from_micros(100));
            } else {
                backoff.snooze();
            }
            op = match self.try_offer(op) {
                Err(r) if r.reason == QueueError::Full => r.into_inner(),
                other => return other,
            };
        }
    }

    /// Enqueue without waiting
    pub fn try_offer(&self, op: T) -> Result<(), Rejected<T>> {
        let _gate = self.gate.read();
        if self.closed.load(Ordering::Acquire) {
            return Err(Rejected::new(QueueError::Closed, op));
        }
        self.ops
            .push(op)
            .map_err(|op| Rejected::new(QueueError::Full, op))
    }

    /// Dequeue the oldest operation
    #[inline]
    pub fn poll(&self) -> Option<T> {
        self.ops.pop()
    }

    /// Dequeue up to `max` operations in FIFO order
    pub fn drain(&self, max: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(max.min(self.ops.len()));
        self.drain_into(&mut out, max);
        out
    }

    /// Dequeue up to `max` operations into `out`, returning how many moved
    pub fn drain_into(&self, out: &mut Vec<T>, max: usize) -> usize {
        let mut moved = 0;
        while moved < max {
            match self.ops.pop() {
                Some(op) => {
                    out.push(op);
                    moved += 1;
                }
                None => break,
            }
        }
        moved
    }

    /// Drop every queued operation, returning how many were dropped
    pub fn clear(&self) -> usize {
        self.lock_exclusive().clear()
    }

    /// Reject all further enqueues
    pub fn close(&self) {
        self.lock_exclusive().close();
    }

    /// Hold the exclusive gate; no enqueue completes while the guard lives
    pub fn lock_exclusive(&self) -> QueueGuard<'_, T> {
        QueueGuard {
            queue: self,
            _gate: self.gate.write(),
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current size; advisory only under concurrent mutation
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ops.capacity()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn max_block_time(&self) -> Option<Duration> {
        self.max_block_time
    }

    fn clear_locked(&self) -> usize {
        let mut dropped = 0;
        while self.ops.pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}

impl<T> fmt::Debug for OperationQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Exclusive access to a queue; enqueues wait until it is dropped
pub struct QueueGuard<'a, T> {
    queue: &'a OperationQueue<T>,
    _gate: RwLockWriteGuard<'a, ()>,
}

impl<T> QueueGuard<'_, T> {
    /// Drop every queued operation, returning how many were dropped
    pub fn clear(&self) -> usize {
        self.queue.clear_locked()
    }

    /// Reject all further enqueues
    pub fn close(&self) {
        self.queue.closed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = OperationQueue::new("write", 8, None);
        for i in 0..5 {
            queue.offer(i).unwrap();
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.drain(3), vec![0, 1, 2]);
        assert_eq!(queue.poll(), Some(3));
        assert_eq!(queue.poll(), Some(4));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn test_full_queue_fails_fast() {
        let queue = OperationQueue::new("input", 2, None);
        queue.offer(1).unwrap();
        queue.offer(2).unwrap();

        let rejected = queue.offer(3).unwrap_err();
        assert_eq!(rejected.reason(), QueueError::Full);
        assert_eq!(rejected.into_inner(), 3);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_full_queue_times_out() {
        let block = Duration::from_millis(20);
        let queue = OperationQueue::new("write", 1, Some(block));
        queue.offer(1).unwrap();

        let start = Instant::now();
        let rejected = queue.offer(2).unwrap_err();
        assert!(start.elapsed() >= block);
        assert_eq!(rejected.reason(), QueueError::Timeout(block));
        assert_eq!(rejected.into_inner(), 2);
    }

    #[test]
    fn test_blocked_offer_succeeds_when_space_frees() {
        let queue = Arc::new(OperationQueue::new("write", 1, Some(Duration::from_secs(5))));
        queue.offer(1).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.offer(2).map_err(|r| r.reason()))
        };

        thread::sleep(Duration::from_millis(10));
        assert_eq!(queue.poll(), Some(1));
        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(queue.poll(), Some(2));
    }

    #[test]
    fn test_clear_returns_dropped_count() {
        let queue = OperationQueue::new("read", 16, None);
        assert_eq!(queue.clear(), 0);

        for i in 0..7 {
            queue.offer(i).unwrap();
        }
        assert_eq!(queue.clear(), 7);
        assert!(queue.is_empty());
        // Clearing does not close
        queue.offer(99).unwrap();
    }

    #[test]
    fn test_closed_queue_rejects() {
        let queue = OperationQueue::new("write", 4, Some(Duration::from_millis(50)));
        queue.close();
        assert!(queue.is_closed());

        let rejected = queue.offer(1).unwrap_err();
        assert_eq!(rejected.reason(), QueueError::Closed);
    }

    #[test]
    fn test_exclusive_guard_holds_off_offers() {
        let queue = Arc::new(OperationQueue::new("write", 4, None));
        let guard = queue.lock_exclusive();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.offer(1).map_err(|r| r.reason()))
        };

        thread::sleep(Duration::from_millis(20));
        assert!(guard.is_empty());
        guard.close();
        drop(guard);

        assert_eq!(producer.join().unwrap(), Err(QueueError::Closed));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_producers_consumers() {
        let queue = Arc::new(OperationQueue::new("write", 64, Some(Duration::from_secs(5))));
        let consumed = Arc::new(AtomicUsize::new(0));
        let producers = 4;
        let per_producer = 1000;

        let producer_handles: Vec<_> = (0..producers)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        queue.offer(p * per_producer + i).unwrap();
                    }
                })
            })
            .collect();

        let consumer_handles: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let consumed = Arc::clone(&consumed);
                thread::spawn(move || {
                    while consumed.load(Ordering::SeqCst) < producers * per_producer {
                        if queue.poll().is_some() {
                            consumed.fetch_add(1, Ordering::SeqCst);
                        } else {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        for handle in producer_handles {
            handle.join().unwrap();
        }
        for handle in consumer_handles {
            handle.join().unwrap();
        }

        assert_eq!(consumed.load(Ordering::SeqCst), producers * per_producer);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_capacity_rounds_up() {
        let queue: OperationQueue<u8> = OperationQueue::new("input", 0, None);
        assert_eq!(queue.capacity(), 1);
    }
}
