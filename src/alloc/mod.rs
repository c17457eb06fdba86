//! Allocation Module
//!
//! Two-tier page allocation bookkeeping.
//!
//! ## File Layout
//! ```text
//! page 0                 file header
//! page 1                 GAM #0   (bit i = page 1 + i allocated)
//! page 2                 AIM #0   (describes pages 3 ..= 1356)
//! page 3 ..= 1356        data / index / table / overflow pages
//! page 1357              AIM #1   (describes pages 1358 ..= 2711)
//! ...
//! page 65025             GAM #1   (next 65,024-page range)
//! ```
//!
//! - The GAM answers "which id is free"; one bit per page, bit 0 is the GAM.
//! - The AIM answers "which page of kind X has room" without loading pages.

mod aim;
mod gam;

pub use aim::{
    aim_page_id_for, first_aim_page_id, gam_id_for, get_next_aim_page_id,
    is_allocation_information_page, AimEntry, AllocationInformationMap, AIM_ENTRY_SIZE,
    AIM_STRIDE, ENTRIES_PER_AIM,
};
pub use gam::{GlobalAllocationMap, PAGES_PER_GAM};

use crate::page::PageId;

/// Id of the first GAM in every database file
pub const FIRST_GAM_PAGE_ID: PageId = 1;

/// Id of the `index`-th GAM (0-based)
pub fn gam_page_id(index: u32) -> PageId {
    FIRST_GAM_PAGE_ID + index * PAGES_PER_GAM
}
