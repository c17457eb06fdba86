//! Stream disk
//!
//! A single `File` whose cursor is shared, so every transfer seeks under the lock.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::{BufferPool, PageBuffer};
use crate::error::{CairnError, Result};
use crate::page::{PageId, PAGE_SIZE};

use super::{
    check_page_len, open_file, page_offset, pages_in, read_error, write_error, DiskService,
};

pub struct StreamDisk {
    path: PathBuf,
    file: Mutex<File>,
    pool: Arc<dyn BufferPool>,
}

impl StreamDisk {
    pub fn open(path: &Path, pool: Arc<dyn BufferPool>) -> Result<Self> {
        let file = open_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            pool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiskService for StreamDisk {
    fn read_page(&self, page_id: PageId) -> Result<PageBuffer> {
        let mut buffer = self.pool.rent()?;
        let mut file = self.file.lock();

        let len = file.metadata().map_err(read_error(page_id))?.len();
        if page_offset(page_id) + PAGE_SIZE as u64 > len {
            return Err(CairnError::PageNotFound { page_id });
        }

        file.seek(SeekFrom::Start(page_offset(page_id)))
            .map_err(read_error(page_id))?;
        file.read_exact(&mut buffer).map_err(read_error(page_id))?;
        debug!("Read page {} from {}", page_id, self.path.display());
        Ok(buffer)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_len(data)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_offset(page_id)))
            .map_err(write_error(page_id))?;
        file.write_all(data).map_err(write_error(page_id))?;
        debug!("Wrote page {} to {}", page_id, self.path.display());
        Ok(())
    }

    fn page_count(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok(pages_in(len))
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
