//! Memory-mapped disk
//!
//! The file is mapped in whole and grown `chunk_pages` pages at a time. An
//! access past the mapped range extends the file to the next chunk boundary
//! and replaces the mapping.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use memmap2::MmapMut;
use parking_lot::RwLock;
use tracing::debug;

use crate::buffer::{BufferPool, PageBuffer};
use crate::error::{CairnError, Result};
use crate::page::{PageId, PAGE_SIZE};

use super::{check_page_len, open_file, page_offset, pages_in, write_error, DiskService};

pub struct MmapDisk {
    path: PathBuf,
    file: File,
    map: RwLock<MmapMut>,
    chunk_pages: u32,
    /// Pages written so far; the mapping may extend past this
    page_count: AtomicU32,
    pool: Arc<dyn BufferPool>,
}

impl MmapDisk {
    pub fn open(path: &Path, pool: Arc<dyn BufferPool>, chunk_pages: u32) -> Result<Self> {
        if chunk_pages == 0 {
            return Err(CairnError::Config("mmap_chunk_pages must be positive".to_string()));
        }
        let file = open_file(path)?;
        let len = file.metadata()?.len();
        let page_count = pages_in(len);

        let mapped_len = round_up(len.max(1), chunk_bytes(chunk_pages));
        if mapped_len != len {
            file.set_len(mapped_len)?;
        }
        let map = map_file(&file)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            map: RwLock::new(map),
            chunk_pages,
            page_count: AtomicU32::new(page_count),
            pool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently mapped
    pub fn mapped_len(&self) -> usize {
        self.map.read().len()
    }

    /// Grow the file and replace the mapping so that `end` bytes are mapped
    fn remap(&self, map: &mut MmapMut, end: u64, page_id: PageId) -> Result<()> {
        map.flush().map_err(write_error(page_id))?;
        let new_len = round_up(end, chunk_bytes(self.chunk_pages));
        self.file.set_len(new_len).map_err(write_error(page_id))?;
        *map = map_file(&self.file)?;
        debug!(
            "Remapped {} to {} pages",
            self.path.display(),
            new_len / PAGE_SIZE as u64
        );
        Ok(())
    }
}

impl DiskService for MmapDisk {
    fn read_page(&self, page_id: PageId) -> Result<PageBuffer> {
        if page_id >= self.page_count.load(Ordering::Acquire) {
            return Err(CairnError::PageNotFound { page_id });
        }
        let start = page_offset(page_id) as usize;
        let map = self.map.read();
        if start + PAGE_SIZE > map.len() {
            return Err(CairnError::PageNotFound { page_id });
        }

        let mut buffer = self.pool.rent()?;
        buffer.copy_from_slice(&map[start..start + PAGE_SIZE]);
        Ok(buffer)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_len(data)?;
        let start = page_offset(page_id);
        let end = start + PAGE_SIZE as u64;

        let mut map = self.map.write();
        if end > map.len() as u64 {
            self.remap(&mut map, end, page_id)?;
        }
        let start = start as usize;
        map[start..start + PAGE_SIZE].copy_from_slice(data);
        self.page_count.fetch_max(page_id + 1, Ordering::AcqRel);
        debug!("Wrote page {} to {}", page_id, self.path.display());
        Ok(())
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.page_count.load(Ordering::Acquire))
    }

    fn flush(&self) -> Result<()> {
        self.map.read().flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

fn chunk_bytes(chunk_pages: u32) -> u64 {
    chunk_pages as u64 * PAGE_SIZE as u64
}

fn round_up(len: u64, chunk: u64) -> u64 {
    len.div_ceil(chunk) * chunk
}

fn map_file(file: &File) -> Result<MmapMut> {
    // SAFETY: the file is opened read-write by this process and only ever
    // resized while the write lock on the mapping is held; other processes
    // must not truncate the database file while it is open.
    let map = unsafe { MmapMut::map_mut(file)? };
    Ok(map)
}
