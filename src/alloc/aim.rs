//! Allocation Information Map
//!
//! Entry array describing the pages that follow an AIM inside its GAM range.
//!
//! ## Entry Layout (6 bytes)
//! ```text
//! ┌──────────────┬──────────┬──────────────┐
//! │ page id (4)  │ kind (1) │ fill (1)     │
//! └──────────────┴──────────┴──────────────┘
//! ```
//! Entry `i` of the AIM at `p` describes page `p + 1 + i`; an entry whose page
//! id is 0 is unused.

use crate::buffer::PageBuffer;
use crate::error::{CairnError, Result};
use crate::page::{FillFactor, Page, PageId, PageKind, PAGE_BODY_SIZE};

use super::{FIRST_GAM_PAGE_ID, PAGES_PER_GAM};

pub const AIM_ENTRY_SIZE: usize = 6;

/// Entries that fit in one AIM body
pub const ENTRIES_PER_AIM: u32 = (PAGE_BODY_SIZE / AIM_ENTRY_SIZE) as u32;

/// Distance between consecutive AIMs of one GAM range (the AIM plus its pages)
pub const AIM_STRIDE: u32 = ENTRIES_PER_AIM + 1;

/// AIM slots inside a single GAM range: local ids `1 + k * AIM_STRIDE < PAGES_PER_GAM`
const AIMS_PER_GAM: u32 = (PAGES_PER_GAM - 2) / AIM_STRIDE + 1;

// =============================================================================
// Interleave Arithmetic
// =============================================================================

/// GAM owning `page_id`; `None` for the file header page
pub fn gam_id_for(page_id: PageId) -> Option<PageId> {
    if page_id < FIRST_GAM_PAGE_ID {
        return None;
    }
    let range = (page_id - FIRST_GAM_PAGE_ID) / PAGES_PER_GAM;
    Some(FIRST_GAM_PAGE_ID + range * PAGES_PER_GAM)
}

/// Position of `page_id` relative to its GAM
fn local_id(page_id: PageId) -> Option<u32> {
    gam_id_for(page_id).map(|gam| page_id - gam)
}

pub fn is_allocation_information_page(page_id: PageId) -> bool {
    match local_id(page_id) {
        Some(local) if local >= 1 => {
            (local - 1) % AIM_STRIDE == 0 && (local - 1) / AIM_STRIDE < AIMS_PER_GAM
        }
        _ => false,
    }
}

/// AIM describing `page_id`; `None` for header, GAM and AIM pages
pub fn aim_page_id_for(page_id: PageId) -> Option<PageId> {
    let gam = gam_id_for(page_id)?;
    let local = page_id - gam;
    if local == 0 || is_allocation_information_page(page_id) {
        return None;
    }
    let k = (local - 1) / AIM_STRIDE;
    Some(gam + 1 + k * AIM_STRIDE)
}

/// First AIM of the range owned by `gam_id`
pub fn first_aim_page_id(gam_id: PageId) -> PageId {
    gam_id + 1
}

/// AIM following `current`, rolling into the next GAM range after the last one
pub fn get_next_aim_page_id(current: PageId) -> Result<PageId> {
    if !is_allocation_information_page(current) {
        return Err(CairnError::InvalidPage {
            page_id: current,
            reason: "not an allocation information page".to_string(),
        });
    }
    let gam = gam_id_for(current).unwrap_or(FIRST_GAM_PAGE_ID);
    let k = (current - gam - 1) / AIM_STRIDE;
    if k + 1 < AIMS_PER_GAM {
        Ok(current + AIM_STRIDE)
    } else {
        Ok(first_aim_page_id(gam + PAGES_PER_GAM))
    }
}

// =============================================================================
// Allocation Information Map
// =============================================================================

/// One decoded entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AimEntry {
    pub page_id: PageId,
    pub kind: PageKind,
    pub fill: FillFactor,
}

pub struct AllocationInformationMap {
    page: Page,
}

impl AllocationInformationMap {
    pub fn create(buffer: PageBuffer, id: PageId) -> Result<Self> {
        if !is_allocation_information_page(id) {
            return Err(CairnError::InvalidPage {
                page_id: id,
                reason: "not an allocation information position".to_string(),
            });
        }
        let mut page = Page::new(buffer, id, PageKind::AllocationInformation);
        page.reserve_body();
        Ok(Self { page })
    }

    pub fn load(buffer: PageBuffer) -> Result<Self> {
        let page = Page::load(buffer, PageKind::AllocationInformation)?;
        Ok(Self { page })
    }

    pub fn id(&self) -> PageId {
        self.page.id()
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    /// Register a newly allocated page
    pub fn add_entry(&mut self, page_id: PageId, kind: PageKind, fill: FillFactor) -> Result<()> {
        let at = self.entry_offset(page_id)?;
        let body = self.page.body_mut();
        body[at..at + 4].copy_from_slice(&page_id.to_le_bytes());
        body[at + 4] = kind.as_byte();
        body[at + 5] = fill.as_byte();
        Ok(())
    }

    /// Record a new fill factor for a registered page
    pub fn update_entry(&mut self, page_id: PageId, fill: FillFactor) -> Result<()> {
        let at = self.entry_offset(page_id)?;
        if self.stored_page_id(at) != page_id {
            return Err(CairnError::PageNotFound { page_id });
        }
        if self.page.body()[at + 5] != fill.as_byte() {
            self.page.body_mut()[at + 5] = fill.as_byte();
        }
        Ok(())
    }

    pub fn get_entry(&self, page_id: PageId) -> Result<Option<AimEntry>> {
        let at = self.entry_offset(page_id)?;
        if self.stored_page_id(at) != page_id {
            return Ok(None);
        }
        self.decode_entry(at).map(Some)
    }

    /// First registered page of `kind` whose fill factor is at most `max_fill`
    pub fn find_page_with_free_space(
        &self,
        kind: PageKind,
        max_fill: FillFactor,
    ) -> Result<Option<PageId>> {
        for index in 0..ENTRIES_PER_AIM as usize {
            let at = index * AIM_ENTRY_SIZE;
            if self.stored_page_id(at) == 0 {
                continue;
            }
            let entry = self.decode_entry(at)?;
            if entry.kind == kind && entry.fill <= max_fill {
                return Ok(Some(entry.page_id));
            }
        }
        Ok(None)
    }

    /// Every registered entry in page-id order
    pub fn entries(&self) -> Result<Vec<AimEntry>> {
        (0..ENTRIES_PER_AIM as usize)
            .map(|index| index * AIM_ENTRY_SIZE)
            .filter(|&at| self.stored_page_id(at) != 0)
            .map(|at| self.decode_entry(at))
            .collect()
    }

    fn entry_offset(&self, page_id: PageId) -> Result<usize> {
        match aim_page_id_for(page_id) {
            Some(aim) if aim == self.id() => {
                Ok((page_id - aim - 1) as usize * AIM_ENTRY_SIZE)
            }
            _ => Err(CairnError::InvalidPage {
                page_id,
                reason: format!("not described by allocation information page {}", self.id()),
            }),
        }
    }

    fn stored_page_id(&self, at: usize) -> PageId {
        let body = self.page.body();
        u32::from_le_bytes([body[at], body[at + 1], body[at + 2], body[at + 3]])
    }

    fn decode_entry(&self, at: usize) -> Result<AimEntry> {
        let body = self.page.body();
        let page_id = self.stored_page_id(at);
        let kind = PageKind::from_byte(body[at + 4]).ok_or_else(|| {
            CairnError::Corruption(format!(
                "allocation entry for page {} has kind byte {}",
                page_id,
                body[at + 4]
            ))
        })?;
        Ok(AimEntry {
            page_id,
            kind,
            fill: FillFactor::from_byte(body[at + 5])?,
        })
    }
}
