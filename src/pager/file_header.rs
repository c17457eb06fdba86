//! File header page (page 0)
//!
//! ```text
//! kind-specific header
//!  0  4  magic "CRN1"
//!  4  2  format version
//!  8  8  creation time, unix millis
//! 16  4  number of GAM pages
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use crate::buffer::PageBuffer;
use crate::error::{CairnError, Result};
use crate::page::{Page, PageKind};

pub const FILE_MAGIC: &[u8; 4] = b"CRN1";
pub const FORMAT_VERSION: u16 = 1;

pub const HEADER_PAGE_ID: u32 = 0;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const CREATED_OFFSET: usize = 8;
const GAM_COUNT_OFFSET: usize = 16;

pub struct FileHeader {
    page: Page,
}

impl FileHeader {
    pub fn create(buffer: PageBuffer) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        let mut page = Page::new(buffer, HEADER_PAGE_ID, PageKind::Header);
        let ext = page.ext_mut();
        ext[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(FILE_MAGIC);
        ext[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        ext[CREATED_OFFSET..CREATED_OFFSET + 8].copy_from_slice(&created_at.to_le_bytes());
        ext[GAM_COUNT_OFFSET..GAM_COUNT_OFFSET + 4].copy_from_slice(&1u32.to_le_bytes());
        Self { page }
    }

    pub fn load(buffer: PageBuffer) -> Result<Self> {
        let page = Page::load(buffer, PageKind::Header)?;
        let header = Self { page };

        if &header.page.ext()[MAGIC_OFFSET..MAGIC_OFFSET + 4] != FILE_MAGIC {
            return Err(CairnError::Corruption(format!(
                "invalid file magic: expected CRN1, got {:?}",
                &header.page.ext()[MAGIC_OFFSET..MAGIC_OFFSET + 4]
            )));
        }
        if header.version() != FORMAT_VERSION {
            return Err(CairnError::Corruption(format!(
                "unsupported file format version: {}",
                header.version()
            )));
        }
        Ok(header)
    }

    pub fn version(&self) -> u16 {
        let ext = self.page.ext();
        u16::from_le_bytes([ext[VERSION_OFFSET], ext[VERSION_OFFSET + 1]])
    }

    pub fn created_at(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.page.ext()[CREATED_OFFSET..CREATED_OFFSET + 8]);
        u64::from_le_bytes(bytes)
    }

    pub fn gam_count(&self) -> u32 {
        let ext = self.page.ext();
        u32::from_le_bytes([
            ext[GAM_COUNT_OFFSET],
            ext[GAM_COUNT_OFFSET + 1],
            ext[GAM_COUNT_OFFSET + 2],
            ext[GAM_COUNT_OFFSET + 3],
        ])
    }

    pub fn set_gam_count(&mut self, count: u32) {
        if count != self.gam_count() {
            self.page.ext_mut()[GAM_COUNT_OFFSET..GAM_COUNT_OFFSET + 4]
                .copy_from_slice(&count.to_le_bytes());
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }
}
