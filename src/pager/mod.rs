//! Pager Module
//!
//! Owns every page held in memory and decides when it reaches the disk.
//!
//! ## Responsibilities
//! - Cache pages (LRU, bounded by `max_page_cache`)
//! - Allocate page ids through the GAMs and register them in the AIMs
//! - Persist dirty pages with a fresh checksum
//! - Track Data pages that still have room
//! - Record which owner has claimed a page for an in-flight write
//!
//! ## Lock Order
//! ```text
//! alloc ─► gams ─► aims
//! cache ─► page ─► aims ─► free index
//! ```

mod file_header;
mod service;

pub use file_header::{FileHeader, FILE_MAGIC, FORMAT_VERSION, HEADER_PAGE_ID};
pub use service::PageService;

use crate::buffer::PoolStats;
use crate::page::{FillFactor, Page, PageId, PageKind};

/// Snapshot of one page's header, for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub page_id: PageId,
    pub kind: PageKind,
    pub prev_page_id: PageId,
    pub next_page_id: PageId,
    pub used_bytes: usize,
    pub slot_count: usize,
    pub fill: FillFactor,
    pub dirty: bool,
}

impl PageSummary {
    pub(crate) fn of(page: &Page) -> Self {
        Self {
            page_id: page.id(),
            kind: page.kind(),
            prev_page_id: page.prev_page_id(),
            next_page_id: page.next_page_id(),
            used_bytes: page.used_bytes(),
            slot_count: page.slot_count(),
            fill: page.fill_factor(),
            dirty: page.is_dirty(),
        }
    }
}

/// Page service counters
#[derive(Debug, Clone)]
pub struct PagerStats {
    pub cached_pages: usize,
    pub dirty_pages: usize,
    pub gam_count: usize,
    pub loaded_aims: usize,
    pub free_data_pages: usize,
    pub claimed_pages: usize,
    pub disk_pages: u32,
    pub pool: PoolStats,
}
