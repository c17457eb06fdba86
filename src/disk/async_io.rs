//! Async disk facade
//!
//! Runs blocking page transfers on tokio's blocking thread pool. A write takes
//! its buffer by value and only hands it back once the bytes have reached the
//! backend, so a buffer cannot return to its pool mid-write.

use std::sync::Arc;

use tokio::task;

use crate::buffer::PageBuffer;
use crate::error::{CairnError, Result};
use crate::page::PageId;

use super::DiskService;

#[derive(Clone)]
pub struct AsyncDisk {
    inner: Arc<dyn DiskService>,
}

impl AsyncDisk {
    pub fn new(inner: Arc<dyn DiskService>) -> Self {
        Self { inner }
    }

    /// Backend used for the blocking transfers
    pub fn inner(&self) -> &Arc<dyn DiskService> {
        &self.inner
    }

    pub async fn read_page(&self, page_id: PageId) -> Result<PageBuffer> {
        let disk = Arc::clone(&self.inner);
        run(move || disk.read_page(page_id)).await
    }

    /// Write `buffer` at `page_id`; resolves with the same buffer after the write
    pub async fn write_page(&self, page_id: PageId, buffer: PageBuffer) -> Result<PageBuffer> {
        let disk = Arc::clone(&self.inner);
        run(move || {
            disk.write_page(page_id, &buffer)?;
            Ok(buffer)
        })
        .await
    }

    pub async fn flush(&self) -> Result<()> {
        let disk = Arc::clone(&self.inner);
        run(move || disk.flush()).await
    }

    pub async fn page_count(&self) -> Result<u32> {
        let disk = Arc::clone(&self.inner);
        run(move || disk.page_count()).await
    }
}

async fn run<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| CairnError::Task(e.to_string()))?
}
