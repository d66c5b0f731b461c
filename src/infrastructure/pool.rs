//! Object pooling for connection I/O buffers
//!
//! Pre-allocated read/write buffers shared by every node of a client.
//! Uses crossbeam-queue for lock-free acquire/release.

use bytes::BytesMut;
use crossbeam_queue::ArrayQueue;

/// Generic object pool for pre-allocated buffers
///
/// # Type Parameters
/// - `T`: The type of object to pool. Must be Send for thread safety.
///
/// # Example
/// ```
/// use cache_node::infrastructure::pool::ObjectPool;
///
/// let pool = ObjectPool::with_capacity(4, || vec![0u8; 1024]);
///
/// let buf = pool.acquire_or_create();
/// assert!(pool.release(buf).is_ok());
/// ```
pub struct ObjectPool<T: Send> {
    stack: ArrayQueue<T>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Send> ObjectPool<T> {
    /// Create a new pool with pre-allocated objects
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of objects in the pool (at least 1)
    /// * `factory` - Function to create new objects when pool is empty
    pub fn with_capacity<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let stack = ArrayQueue::new(capacity.max(1));

        // Pre-populate the pool
        while stack.push(factory()).is_ok() {}

        Self {
            stack,
            factory: Box::new(factory),
        }
    }

    /// Acquire an object from the pool
    ///
    /// Returns `None` if the pool is empty.
    #[inline(always)]
    pub fn acquire(&self) -> Option<T> {
        self.stack.pop()
    }

    /// Acquire an object, creating a fresh one if the pool is empty
    #[inline]
    pub fn acquire_or_create(&self) -> T {
        self.acquire().unwrap_or_else(|| (self.factory)())
    }

    /// Release an object back to the pool
    ///
    /// # Returns
    /// - `Ok(())` - Object was added to the pool
    /// - `Err(T)` - Pool is full, caller must handle the object
    #[inline(always)]
    pub fn release(&self, obj: T) -> Result<(), T> {
        self.stack.push(obj)
    }

    /// Get the number of available objects in the pool
    #[inline]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Check if the pool is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Get the capacity of the pool
    #[inline]
    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }
}

/// Pool of connection I/O buffers
pub type ByteBufferPool = ObjectPool<BytesMut>;

impl ByteBufferPool {
    /// Create a pool of byte buffers with fixed capacity
    pub fn with_buffer_size(pool_capacity: usize, buffer_size: usize) -> Self {
        Self::with_capacity(pool_capacity, move || BytesMut::with_capacity(buffer_size))
    }

    /// Return a buffer to the pool, emptied
    #[inline]
    pub fn release_cleared(&self, mut buf: BytesMut) -> Result<(), BytesMut> {
        buf.clear();
        self.release(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation() {
        let pool = ByteBufferPool::with_buffer_size(8, 1024);
        assert_eq!(pool.len(), 8);
        assert_eq!(pool.capacity(), 8);
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_acquire_release() {
        let pool = ObjectPool::with_capacity(4, || 42i32);

        let mut objects = Vec::new();
        for _ in 0..4 {
            objects.push(pool.acquire().unwrap());
        }

        assert!(pool.is_empty());
        assert!(pool.acquire().is_none());
        assert_eq!(pool.acquire_or_create(), 42);

        for obj in objects {
            pool.release(obj).unwrap();
        }
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_release_to_full_pool() {
        let pool = ObjectPool::with_capacity(2, || 0i32);
        let result = pool.release(999);
        assert_eq!(result.unwrap_err(), 999);
    }

    #[test]
    fn test_release_cleared() {
        let pool = ByteBufferPool::with_buffer_size(1, 64);

        let mut buf = pool.acquire().unwrap();
        assert!(buf.capacity() >= 64);
        buf.extend_from_slice(b"stale response bytes");
        pool.release_cleared(buf).unwrap();

        let buf = pool.acquire().unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let pool = Arc::new(ByteBufferPool::with_buffer_size(16, 256));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..100 {
                        if let Some(mut buf) = pool.acquire() {
                            buf.extend_from_slice(&[1]);
                            pool.release_cleared(buf).unwrap();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.len(), 16);
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ByteBufferPool>();
    }
}
