//! Buffer Pool Module
//!
//! Rents and returns page-sized byte regions.
//!
//! ## Responsibilities
//! - Hand out one `PageBuffer` per page held in memory
//! - Take buffers back exactly once (the handle is move-only and returns
//!   itself on drop)
//! - Bound memory use (arena) or grow on demand (managed)
//!
//! ## Implementations
//! ```text
//! ┌────────────────────┬───────────────────────────────────────────────┐
//! │ ManagedPool        │ global allocator, keeps a bounded free list   │
//! │ ArenaPool          │ N slots allocated up front, slot index queue  │
//! └────────────────────┴───────────────────────────────────────────────┘
//! ```

mod arena;
mod managed;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::config::{Config, PoolKind};
use crate::error::Result;
use crate::page::PAGE_SIZE;

pub use arena::ArenaPool;
pub use managed::ManagedPool;

/// Source of page buffers shared by the disk and page services
pub trait BufferPool: Send + Sync {
    /// Rent one page-sized buffer
    fn rent(&self) -> Result<PageBuffer>;

    /// Size in bytes of every buffer this pool hands out
    fn buffer_size(&self) -> usize;

    /// Current usage counters
    fn stats(&self) -> PoolStats;
}

/// Pool usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Fixed number of buffers, `None` for growable pools
    pub capacity: Option<usize>,
    /// Buffers currently rented out
    pub rented: usize,
    /// Buffers ready to be rented without allocating
    pub available: usize,
}

/// Build the pool selected by the configuration
pub fn pool_for(config: &Config) -> Arc<dyn BufferPool> {
    match config.pool_kind {
        PoolKind::Managed => Arc::new(ManagedPool::new(PAGE_SIZE, config.max_page_cache)),
        PoolKind::Arena => Arc::new(ArenaPool::new(PAGE_SIZE, config.arena_slots())),
    }
}

// =============================================================================
// PageBuffer
// =============================================================================

/// Receives buffers coming back from a `PageBuffer` drop
pub(crate) trait Recycle: Send + Sync {
    fn recycle(&self, slot: Option<usize>, data: Box<[u8]>);
}

/// Owned handle to one rented buffer.
///
/// Dropping the handle returns the memory to the pool it came from.
pub struct PageBuffer {
    data: Box<[u8]>,
    slot: Option<usize>,
    home: Option<Arc<dyn Recycle>>,
}

impl PageBuffer {
    pub(crate) fn pooled(data: Box<[u8]>, slot: Option<usize>, home: Arc<dyn Recycle>) -> Self {
        Self {
            data,
            slot,
            home: Some(home),
        }
    }

    /// A zeroed buffer that belongs to no pool
    pub fn detached(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
            slot: None,
            home: None,
        }
    }

    /// Arena slot backing this buffer, if it came from an arena
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Zero the whole buffer
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Give the buffer back to its pool
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PageBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PageBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        if let Some(home) = self.home.take() {
            let data = std::mem::take(&mut self.data);
            home.recycle(self.slot, data);
        }
    }
}

impl fmt::Debug for PageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBuffer")
            .field("len", &self.data.len())
            .field("slot", &self.slot)
            .field("pooled", &self.home.is_some())
            .finish()
    }
}
