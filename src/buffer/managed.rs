//! Managed buffer pool
//!
//! Allocates from the global allocator and keeps returned buffers on a
//! lock-free free list for reuse.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::error::Result;

use super::{BufferPool, PageBuffer, PoolStats, Recycle};

/// Growable pool; never fails to rent
pub struct ManagedPool {
    inner: Arc<ManagedInner>,
}

struct ManagedInner {
    buffer_size: usize,
    /// Returned buffers waiting for reuse (contents are not cleared)
    free: SegQueue<Box<[u8]>>,
    /// Free-list bound; extra returns are dropped
    max_retained: usize,
    rented: AtomicUsize,
}

impl ManagedPool {
    /// Create a pool of `buffer_size` buffers retaining at most `max_retained`
    /// returned buffers
    pub fn new(buffer_size: usize, max_retained: usize) -> Self {
        Self {
            inner: Arc::new(ManagedInner {
                buffer_size,
                free: SegQueue::new(),
                max_retained,
                rented: AtomicUsize::new(0),
            }),
        }
    }
}

impl BufferPool for ManagedPool {
    fn rent(&self) -> Result<PageBuffer> {
        let data = self
            .inner
            .free
            .pop()
            .unwrap_or_else(|| vec![0u8; self.inner.buffer_size].into_boxed_slice());
        self.inner.rented.fetch_add(1, Ordering::Relaxed);
        let home: Arc<dyn Recycle> = self.inner.clone();
        Ok(PageBuffer::pooled(data, None, home))
    }

    fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: None,
            rented: self.inner.rented.load(Ordering::Relaxed),
            available: self.inner.free.len(),
        }
    }
}

impl Recycle for ManagedInner {
    fn recycle(&self, _slot: Option<usize>, data: Box<[u8]>) {
        self.rented.fetch_sub(1, Ordering::Relaxed);
        if self.free.len() < self.max_retained && data.len() == self.buffer_size {
            self.free.push(data);
        }
    }
}
