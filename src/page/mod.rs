//! Page Module
//!
//! Fixed-size binary page format shared by every page kind.
//!
//! ## Page Layout (8192 bytes)
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (64 bytes)                                       │
//! │   common (32): id | kind | prev | next | used | slots | │
//! │                next_free | unaligned | crc32            │
//! │   kind-specific (32)                                    │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data area, grows forward  →                             │
//! │   [64, next_free_offset)                                │
//! ├─────────────────────────────────────────────────────────┤
//! │ Free space                                              │
//! ├─────────────────────────────────────────────────────────┤
//! │ ← Slot directory, grows backward                        │
//! │   [8192 - slot_count*4, 8192), entry = offset | length  │
//! │   slot 0 is the last 4 bytes of the page                │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod address;
mod header;
mod kinds;
mod slotted;

pub use address::{PageAddress, PAGE_ADDRESS_SIZE};
pub use header::PageHeader;
pub use kinds::{DataPage, IndexPage, OverflowPage, PageRef, TablePage, TypedPage};
pub use slotted::{Page, SlotEntry};

use crate::error::{CairnError, Result};

// =============================================================================
// Shared Constants
// =============================================================================

/// Page identifier; the byte offset of a page is `id * PAGE_SIZE`
pub type PageId = u32;

/// Size of every page on disk and in memory
pub const PAGE_SIZE: usize = 8192;

/// Common header part shared by all kinds
pub const COMMON_HEADER_SIZE: usize = 32;

/// Full header: common (32) + kind-specific (32)
pub const PAGE_HEADER_SIZE: usize = 64;

/// Bytes available after the header
pub const PAGE_BODY_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Slot directory entry: offset (2) + length (2)
pub const SLOT_SIZE: usize = 4;

/// Slot ids are a single byte in `PageAddress`
pub const MAX_SLOTS: usize = 256;

/// "No page" marker for prev/next links (page 0 is the file header)
pub const NO_PAGE: PageId = 0;

/// Pages with this little usable room left count as full
pub const FULL_PAGE_SLACK: usize = 32;

/// A page that was never written reads back with a zero kind byte
pub(crate) fn is_blank(buf: &[u8]) -> bool {
    header::raw_kind(buf) == 0
}

// =============================================================================
// Page Kind
// =============================================================================

/// Kind byte stored in every page header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PageKind {
    Header = 1,
    Data = 2,
    Index = 3,
    Table = 4,
    Overflow = 5,
    GlobalAllocationMap = 6,
    AllocationInformation = 7,
}

impl PageKind {
    /// Decode a kind byte; `None` for zero or unknown values
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(PageKind::Header),
            2 => Some(PageKind::Data),
            3 => Some(PageKind::Index),
            4 => Some(PageKind::Table),
            5 => Some(PageKind::Overflow),
            6 => Some(PageKind::GlobalAllocationMap),
            7 => Some(PageKind::AllocationInformation),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// Fill Factor
// =============================================================================

/// Coarse occupancy bucket recorded in allocation information maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FillFactor {
    /// Nothing stored
    Empty = 0,
    /// Below 50%
    Low = 1,
    /// 50% to 70%
    Medium = 2,
    /// 70% and above, still room for a small record
    High = 3,
    /// No usable room
    Full = 4,
}

impl FillFactor {
    /// Bucket for a page with `occupied` of `PAGE_BODY_SIZE` bytes taken and
    /// `usable` bytes still insertable
    pub fn from_usage(occupied: usize, usable: usize) -> Self {
        if usable <= FULL_PAGE_SLACK {
            return FillFactor::Full;
        }
        if occupied == 0 {
            return FillFactor::Empty;
        }
        let percent = occupied * 100 / PAGE_BODY_SIZE;
        match percent {
            0..=49 => FillFactor::Low,
            50..=69 => FillFactor::Medium,
            _ => FillFactor::High,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(FillFactor::Empty),
            1 => Ok(FillFactor::Low),
            2 => Ok(FillFactor::Medium),
            3 => Ok(FillFactor::High),
            4 => Ok(FillFactor::Full),
            other => Err(CairnError::Corruption(format!(
                "invalid fill factor byte {}",
                other
            ))),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
