//! Connection I/O buffers
//!
//! A node leases one read and one write buffer for the life of its
//! connection. Shutdown hands them back; the pool is shared by every node of
//! a client, so a leaked buffer is memory the next connection cannot reuse.

use crate::infrastructure::pool::ByteBufferPool;
use bytes::BytesMut;
use std::sync::Arc;

/// Errors that can occur releasing I/O buffers
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Buffer pool full, dropped {0} buffer(s)")]
    PoolFull(usize),
    #[error("Buffer release failed: {0}")]
    ReleaseFailed(String),
}

/// I/O buffers owned by one connection
pub trait IoBuffers: Send {
    /// Give the buffers back; calling again after success is a no-op
    fn release(&mut self) -> Result<(), BufferError>;

    /// Whether the buffers are still held
    fn is_held(&self) -> bool;
}

/// Read/write buffers leased from a shared [`ByteBufferPool`]
pub struct PooledBuffers {
    pool: Arc<ByteBufferPool>,
    read: Option<BytesMut>,
    write: Option<BytesMut>,
}

impl PooledBuffers {
    /// Lease a read and a write buffer, allocating if the pool is drained
    pub fn lease(pool: Arc<ByteBufferPool>) -> Self {
        let read = pool.acquire_or_create();
        let write = pool.acquire_or_create();
        Self {
            pool,
            read: Some(read),
            write: Some(write),
        }
    }

    /// Read buffer, if still held
    pub fn read_buf(&mut self) -> Option<&mut BytesMut> {
        self.read.as_mut()
    }

    /// Write buffer, if still held
    pub fn write_buf(&mut self) -> Option<&mut BytesMut> {
        self.write.as_mut()
    }
}

impl IoBuffers for PooledBuffers {
    fn release(&mut self) -> Result<(), BufferError> {
        let mut dropped = 0;
        for buf in [self.read.take(), self.write.take()].into_iter().flatten() {
            if self.pool.release_cleared(buf).is_err() {
                dropped += 1;
            }
        }

        if dropped > 0 {
            return Err(BufferError::PoolFull(dropped));
        }
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.read.is_some() || self.write.is_some()
    }
}

/// Transport without pooled buffers
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBuffers;

impl IoBuffers for NoBuffers {
    fn release(&mut self) -> Result<(), BufferError> {
        Ok(())
    }

    fn is_held(&self) -> bool {
        false
    }
}
