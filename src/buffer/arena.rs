//! Arena buffer pool
//!
//! All slots are allocated when the pool is built. A slot index travels
//! through a bounded MPMC queue; the bytes for slot `i` always live in the
//! same allocation, so a slot keeps its identity for the pool's lifetime.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::{CairnError, Result};

use super::{BufferPool, PageBuffer, PoolStats, Recycle};

/// Fixed-capacity pool; `rent` fails with `PoolExhausted` when every slot is out
pub struct ArenaPool {
    inner: Arc<ArenaInner>,
}

struct ArenaInner {
    buffer_size: usize,
    /// Slot storage; `None` while the slot is rented
    slots: Vec<Mutex<Option<Box<[u8]>>>>,
    /// Indices of slots ready to rent
    free: ArrayQueue<usize>,
}

impl ArenaPool {
    /// Pre-allocate `slot_count` buffers of `buffer_size` bytes
    ///
    /// # Panics
    ///
    /// Panics if `slot_count` is 0.
    pub fn new(buffer_size: usize, slot_count: usize) -> Self {
        assert!(slot_count > 0, "arena needs at least one slot");

        let slots = (0..slot_count)
            .map(|_| Mutex::new(Some(vec![0u8; buffer_size].into_boxed_slice())))
            .collect();

        let free = ArrayQueue::new(slot_count);
        for slot in 0..slot_count {
            // Capacity equals slot_count, so this cannot overflow
            let _ = free.push(slot);
        }

        Self {
            inner: Arc::new(ArenaInner {
                buffer_size,
                slots,
                free,
            }),
        }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }
}

impl BufferPool for ArenaPool {
    fn rent(&self) -> Result<PageBuffer> {
        let slot = self.inner.free.pop().ok_or(CairnError::PoolExhausted {
            capacity: self.inner.slots.len(),
        })?;

        let data = self.inner.slots[slot].lock().take().ok_or_else(|| {
            CairnError::Corruption(format!("arena slot {} handed out twice", slot))
        })?;

        let home: Arc<dyn Recycle> = self.inner.clone();
        Ok(PageBuffer::pooled(data, Some(slot), home))
    }

    fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    fn stats(&self) -> PoolStats {
        let available = self.inner.free.len();
        PoolStats {
            capacity: Some(self.inner.slots.len()),
            rented: self.inner.slots.len() - available,
            available,
        }
    }
}

impl Recycle for ArenaInner {
    fn recycle(&self, slot: Option<usize>, mut data: Box<[u8]>) {
        let Some(slot) = slot.filter(|&s| s < self.slots.len()) else {
            warn!("Dropping buffer returned to arena without a valid slot");
            return;
        };

        data.fill(0);
        *self.slots[slot].lock() = Some(data);
        if self.free.push(slot).is_err() {
            warn!("Arena free list overflow for slot {}", slot);
        }
    }
}
