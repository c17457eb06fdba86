//! Index page metadata (kind-specific header of Index pages)
//!
//! ```text
//!  0  1  strategy
//!  1  1  is start page
//!  2  1  skip list max level
//!  4  4  tail page id
//!  8  8  live entry count
//! ```
//! Only the start page keeps a meaningful tail and entry count.

use crate::error::{CairnError, Result};
use crate::page::{Page, PageId};

const STRATEGY_OFFSET: usize = 0;
const START_OFFSET: usize = 1;
const MAX_LEVEL_OFFSET: usize = 2;
const TAIL_OFFSET: usize = 4;
const COUNT_OFFSET: usize = 8;

/// How an index lays out its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IndexStrategy {
    Heap = 1,
    SkipList = 2,
}

impl IndexStrategy {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(IndexStrategy::Heap),
            2 => Some(IndexStrategy::SkipList),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMeta {
    pub strategy: IndexStrategy,
    pub is_start: bool,
    pub max_level: u8,
    pub tail_page_id: PageId,
    pub entry_count: u64,
}

impl IndexMeta {
    /// Metadata for the first page of a new index
    pub fn start(strategy: IndexStrategy, root: PageId, max_level: u8) -> Self {
        Self {
            strategy,
            is_start: true,
            max_level,
            tail_page_id: root,
            entry_count: 0,
        }
    }

    /// Metadata for a continuation page
    pub fn continuation(strategy: IndexStrategy) -> Self {
        Self {
            strategy,
            is_start: false,
            max_level: 0,
            tail_page_id: 0,
            entry_count: 0,
        }
    }

    pub fn read(page: &Page) -> Result<Self> {
        let ext = page.ext();
        let strategy =
            IndexStrategy::from_byte(ext[STRATEGY_OFFSET]).ok_or_else(|| CairnError::InvalidPage {
                page_id: page.id(),
                reason: format!("unknown index strategy {}", ext[STRATEGY_OFFSET]),
            })?;

        let mut tail = [0u8; 4];
        tail.copy_from_slice(&ext[TAIL_OFFSET..TAIL_OFFSET + 4]);
        let mut count = [0u8; 8];
        count.copy_from_slice(&ext[COUNT_OFFSET..COUNT_OFFSET + 8]);

        Ok(Self {
            strategy,
            is_start: ext[START_OFFSET] != 0,
            max_level: ext[MAX_LEVEL_OFFSET],
            tail_page_id: u32::from_le_bytes(tail),
            entry_count: u64::from_le_bytes(count),
        })
    }

    pub fn write(&self, page: &mut Page) {
        let ext = page.ext_mut();
        ext[STRATEGY_OFFSET] = self.strategy as u8;
        ext[START_OFFSET] = self.is_start as u8;
        ext[MAX_LEVEL_OFFSET] = self.max_level;
        ext[TAIL_OFFSET..TAIL_OFFSET + 4].copy_from_slice(&self.tail_page_id.to_le_bytes());
        ext[COUNT_OFFSET..COUNT_OFFSET + 8].copy_from_slice(&self.entry_count.to_le_bytes());
    }
}
