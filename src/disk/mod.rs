//! Disk Module
//!
//! Page-granular access to the single database file.
//!
//! ## Responsibilities
//! - Read page `id` from byte offset `id * PAGE_SIZE` into a rented buffer
//! - Write one page worth of bytes back to the same offset
//! - Report I/O failures with the page id and direction
//!
//! ## Backends
//! ```text
//! ┌──────────────────┬────────────────────────────────────────────────┐
//! │ StreamDisk       │ one File behind a mutex, seek + read/write     │
//! │ RandomAccessDisk │ positioned reads/writes, no shared cursor      │
//! │ MmapDisk         │ memory map grown and remapped in fixed chunks  │
//! │ MemoryDisk       │ pages kept in a Vec, nothing touches the disk  │
//! └──────────────────┴────────────────────────────────────────────────┘
//! ```
//! `AsyncDisk` wraps any backend and runs each transfer on tokio's blocking
//! pool, so callers await exactly at the read/write boundary.

mod async_io;
mod memory;
mod mmap;
mod random_access;
mod stream;

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::buffer::{BufferPool, PageBuffer};
use crate::config::{Config, DiskBackend};
use crate::error::{CairnError, IoDirection, Result};
use crate::page::{PageId, PAGE_SIZE};

pub use async_io::AsyncDisk;
pub use memory::MemoryDisk;
pub use mmap::MmapDisk;
pub use random_access::RandomAccessDisk;
pub use stream::StreamDisk;

/// Page I/O backend
pub trait DiskService: Send + Sync {
    /// Read page `page_id` into a buffer rented from the service's pool.
    ///
    /// Fails with `PageNotFound` when the page lies past the end of the file.
    fn read_page(&self, page_id: PageId) -> Result<PageBuffer>;

    /// Write exactly one page of bytes at `page_id`, growing the file if needed
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Pages the file currently spans
    fn page_count(&self) -> Result<u32>;

    /// Push buffered writes to stable storage
    fn flush(&self) -> Result<()>;
}

/// Byte offset of a page in the file
pub fn page_offset(page_id: PageId) -> u64 {
    page_id as u64 * PAGE_SIZE as u64
}

/// Open the backend selected by the configuration
pub fn open_disk(config: &Config, pool: Arc<dyn BufferPool>) -> Result<Arc<dyn DiskService>> {
    info!("Opening {:?} disk at {}", config.disk_backend, config.path.display());
    let disk: Arc<dyn DiskService> = match config.disk_backend {
        DiskBackend::Stream => Arc::new(StreamDisk::open(&config.path, pool)?),
        DiskBackend::RandomAccess => Arc::new(RandomAccessDisk::open(&config.path, pool)?),
        DiskBackend::MemoryMapped => {
            Arc::new(MmapDisk::open(&config.path, pool, config.mmap_chunk_pages)?)
        }
        DiskBackend::Memory => Arc::new(MemoryDisk::new(pool)),
    };
    Ok(disk)
}

// =============================================================================
// Shared Helpers
// =============================================================================

fn open_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

fn check_page_len(data: &[u8]) -> Result<()> {
    if data.len() != PAGE_SIZE {
        return Err(CairnError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: data.len(),
        });
    }
    Ok(())
}

fn read_error(page_id: PageId) -> impl FnOnce(std::io::Error) -> CairnError {
    move |source| CairnError::PageIo {
        page_id,
        direction: IoDirection::Read,
        source,
    }
}

fn write_error(page_id: PageId) -> impl FnOnce(std::io::Error) -> CairnError {
    move |source| CairnError::PageIo {
        page_id,
        direction: IoDirection::Write,
        source,
    }
}

fn pages_in(len: u64) -> u32 {
    (len / PAGE_SIZE as u64) as u32
}
