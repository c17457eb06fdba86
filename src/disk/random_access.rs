//! Random access disk
//!
//! Positioned reads and writes; concurrent transfers of different pages do
//! not contend on a shared cursor.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPool, PageBuffer};
use crate::error::{CairnError, Result};
use crate::page::{PageId, PAGE_SIZE};

use super::{
    check_page_len, open_file, page_offset, pages_in, read_error, write_error, DiskService,
};

pub struct RandomAccessDisk {
    path: PathBuf,
    file: File,
    pool: Arc<dyn BufferPool>,
}

impl RandomAccessDisk {
    pub fn open(path: &Path, pool: Arc<dyn BufferPool>) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            file: open_file(path)?,
            pool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiskService for RandomAccessDisk {
    fn read_page(&self, page_id: PageId) -> Result<PageBuffer> {
        let len = self.file.metadata().map_err(read_error(page_id))?.len();
        if page_offset(page_id) + PAGE_SIZE as u64 > len {
            return Err(CairnError::PageNotFound { page_id });
        }

        let mut buffer = self.pool.rent()?;
        read_at(&self.file, &mut buffer, page_offset(page_id)).map_err(read_error(page_id))?;
        debug!("Read page {} from {}", page_id, self.path.display());
        Ok(buffer)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_len(data)?;
        write_at(&self.file, data, page_offset(page_id)).map_err(write_error(page_id))?;
        debug!("Wrote page {} to {}", page_id, self.path.display());
        Ok(())
    }

    fn page_count(&self) -> Result<u32> {
        Ok(pages_in(self.file.metadata()?.len()))
    }

    fn flush(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset)? {
            0 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            n => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset)? {
            0 => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            n => {
                buf = &buf[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}
