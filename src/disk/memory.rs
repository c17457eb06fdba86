//! In-memory disk for tests and scratch databases

use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::{BufferPool, PageBuffer};
use crate::error::{CairnError, Result};
use crate::page::{PageId, PAGE_SIZE};

use super::{check_page_len, DiskService};

pub struct MemoryDisk {
    pages: RwLock<Vec<Box<[u8]>>>,
    pool: Arc<dyn BufferPool>,
}

impl MemoryDisk {
    pub fn new(pool: Arc<dyn BufferPool>) -> Self {
        Self {
            pages: RwLock::new(Vec::new()),
            pool,
        }
    }
}

impl DiskService for MemoryDisk {
    fn read_page(&self, page_id: PageId) -> Result<PageBuffer> {
        let pages = self.pages.read();
        let page = pages
            .get(page_id as usize)
            .ok_or(CairnError::PageNotFound { page_id })?;
        let mut buffer = self.pool.rent()?;
        buffer.copy_from_slice(page);
        Ok(buffer)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_len(data)?;
        let mut pages = self.pages.write();
        let index = page_id as usize;
        // Writing past the end leaves zeroed holes, as a sparse file would
        while pages.len() <= index {
            pages.push(vec![0u8; PAGE_SIZE].into_boxed_slice());
        }
        pages[index].copy_from_slice(data);
        Ok(())
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.read().len() as u32)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
