//! Global Allocation Map
//!
//! A page whose body is a bitmap over the `PAGES_PER_GAM` pages starting at
//! the GAM's own id. Bits are stored MSB-first so a 64-bit big-endian word
//! read from the body has local id `w * 64` in its most significant bit, and
//! `leading_ones` counts the allocated prefix of the word.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::PageBuffer;
use crate::error::{CairnError, Result};
use crate::page::{Page, PageId, PageKind, PAGE_BODY_SIZE};

/// Pages covered by one GAM, the GAM itself included
pub const PAGES_PER_GAM: u32 = (PAGE_BODY_SIZE * 8) as u32;

const WORDS: usize = PAGE_BODY_SIZE / 8;
const GROUP: usize = 4;

/// Offset of the persisted `last_issued` field in the kind-specific header
const LAST_ISSUED_EXT: usize = 0;

pub struct GlobalAllocationMap {
    id: PageId,
    page: Mutex<Page>,
    /// Local id handed out most recently; the fast path tries the one after it
    last_issued: AtomicU32,
}

impl GlobalAllocationMap {
    /// Build a new, empty map at `id`; only the map's own bit is set
    pub fn create(buffer: PageBuffer, id: PageId) -> Self {
        let mut page = Page::new(buffer, id, PageKind::GlobalAllocationMap);
        page.reserve_body();
        set_bit(page.body_mut(), 0);
        Self {
            id,
            page: Mutex::new(page),
            last_issued: AtomicU32::new(0),
        }
    }

    /// Wrap a map read from disk
    pub fn load(buffer: PageBuffer) -> Result<Self> {
        let page = Page::load(buffer, PageKind::GlobalAllocationMap)?;
        let ext = page.ext();
        let last_issued = u32::from_le_bytes([
            ext[LAST_ISSUED_EXT],
            ext[LAST_ISSUED_EXT + 1],
            ext[LAST_ISSUED_EXT + 2],
            ext[LAST_ISSUED_EXT + 3],
        ]);
        Ok(Self {
            id: page.id(),
            page: Mutex::new(page),
            last_issued: AtomicU32::new(last_issued.min(PAGES_PER_GAM - 1)),
        })
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    /// Allocate the next free page id in this range
    pub fn acquire_page_id(&self) -> Result<PageId> {
        let mut page = self.page.lock();

        let last = self.last_issued.load(Ordering::Acquire);
        let candidate = last + 1;
        let local = if candidate < PAGES_PER_GAM && !test_bit(page.body(), candidate) {
            candidate
        } else {
            find_first_free(page.body()).ok_or_else(|| CairnError::InvalidPage {
                page_id: self.id,
                reason: "global allocation map is full".to_string(),
            })?
        };

        set_bit(page.body_mut(), local);
        page.ext_mut()[LAST_ISSUED_EXT..LAST_ISSUED_EXT + 4].copy_from_slice(&local.to_le_bytes());
        self.last_issued.store(local, Ordering::Release);

        let page_id = self.id + local;
        debug!("GAM {} issued page {}", self.id, page_id);
        Ok(page_id)
    }

    /// Whether `page_id` is allocated in this range
    pub fn is_allocated(&self, page_id: PageId) -> Result<bool> {
        let local = self.local_id(page_id)?;
        if local == 0 {
            return Ok(true);
        }
        Ok(test_bit(self.page.lock().body(), local))
    }

    /// No free id remains
    pub fn is_full(&self) -> bool {
        find_first_free(self.page.lock().body()).is_none()
    }

    /// Number of allocated ids, the map's own page included
    pub fn allocated_count(&self) -> u32 {
        let page = self.page.lock();
        page.body().iter().map(|byte| byte.count_ones()).sum()
    }

    /// Whether `page_id` falls inside this map's range
    pub fn covers(&self, page_id: PageId) -> bool {
        self.local_id(page_id).is_ok()
    }

    /// Run `f` with exclusive access to the underlying page (used to persist it)
    pub fn with_page<R>(&self, f: impl FnOnce(&mut Page) -> R) -> R {
        f(&mut self.page.lock())
    }

    fn local_id(&self, page_id: PageId) -> Result<u32> {
        if page_id < self.id || page_id - self.id >= PAGES_PER_GAM {
            return Err(CairnError::InvalidPage {
                page_id,
                reason: format!(
                    "outside allocation map {} range [{}, {})",
                    self.id,
                    self.id,
                    self.id as u64 + PAGES_PER_GAM as u64
                ),
            });
        }
        Ok(page_id - self.id)
    }
}

// =============================================================================
// Bitmap Helpers
// =============================================================================

fn test_bit(body: &[u8], local: u32) -> bool {
    let local = local as usize;
    body[local / 8] & (0x80 >> (local % 8)) != 0
}

fn set_bit(body: &mut [u8], local: u32) {
    let local = local as usize;
    body[local / 8] |= 0x80 >> (local % 8);
}

fn word_at(body: &[u8], word: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&body[word * 8..word * 8 + 8]);
    u64::from_be_bytes(bytes)
}

/// First unset bit, scanning four words at a time.
///
/// Ids are handed out lowest-first and never returned, so a group whose last
/// word is saturated is saturated throughout.
fn find_first_free(body: &[u8]) -> Option<u32> {
    for group_start in (0..WORDS).step_by(GROUP) {
        let group_end = (group_start + GROUP).min(WORDS);
        if word_at(body, group_end - 1) == u64::MAX {
            continue;
        }
        for word_index in group_start..group_end {
            let word = word_at(body, word_index);
            if word != u64::MAX {
                return Some((word_index * 64) as u32 + word.leading_ones());
            }
        }
    }
    None
}
