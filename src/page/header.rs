//! Common page header (first 32 bytes of every page)
//!
//! ```text
//! offset  size  field
//!  0      4     page id
//!  4      1     page kind
//!  5      3     reserved
//!  8      4     previous page id (same kind)
//! 12      4     next page id (same kind)
//! 16      2     used bytes
//! 18      2     slot count (highest slot id + 1)
//! 20      2     next free offset
//! 22      2     unaligned free bytes
//! 24      4     crc32 of the page with this field zeroed
//! 28      4     reserved
//! ```

use crate::error::{CairnError, Result};

use super::{PageId, PageKind, NO_PAGE, PAGE_HEADER_SIZE, PAGE_SIZE};

pub(crate) const ID_OFFSET: usize = 0;
pub(crate) const KIND_OFFSET: usize = 4;
const PREV_OFFSET: usize = 8;
const NEXT_OFFSET: usize = 12;
const USED_OFFSET: usize = 16;
const SLOT_COUNT_OFFSET: usize = 18;
const NEXT_FREE_OFFSET: usize = 20;
const UNALIGNED_OFFSET: usize = 22;
pub(crate) const CHECKSUM_OFFSET: usize = 24;

/// Decoded common header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_id: PageId,
    pub kind: PageKind,
    pub prev_page_id: PageId,
    pub next_page_id: PageId,
    pub used_bytes: u16,
    pub slot_count: u16,
    pub next_free_offset: u16,
    pub unaligned_free_bytes: u16,
    pub checksum: u32,
}

impl PageHeader {
    /// Header of a freshly created, empty page
    pub fn new(page_id: PageId, kind: PageKind) -> Self {
        Self {
            page_id,
            kind,
            prev_page_id: NO_PAGE,
            next_page_id: NO_PAGE,
            used_bytes: 0,
            slot_count: 0,
            next_free_offset: PAGE_HEADER_SIZE as u16,
            unaligned_free_bytes: 0,
            checksum: 0,
        }
    }

    /// Decode the common header from the start of a page buffer
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let page_id = read_u32(buf, ID_OFFSET);
        let kind = PageKind::from_byte(buf[KIND_OFFSET]).ok_or_else(|| CairnError::InvalidPage {
            page_id,
            reason: format!("unknown page kind 0x{:02x}", buf[KIND_OFFSET]),
        })?;

        Ok(Self {
            page_id,
            kind,
            prev_page_id: read_u32(buf, PREV_OFFSET),
            next_page_id: read_u32(buf, NEXT_OFFSET),
            used_bytes: read_u16(buf, USED_OFFSET),
            slot_count: read_u16(buf, SLOT_COUNT_OFFSET),
            next_free_offset: read_u16(buf, NEXT_FREE_OFFSET),
            unaligned_free_bytes: read_u16(buf, UNALIGNED_OFFSET),
            checksum: read_u32(buf, CHECKSUM_OFFSET),
        })
    }

    /// Encode the common header into the start of a page buffer
    pub fn encode(&self, buf: &mut [u8]) {
        buf[ID_OFFSET..ID_OFFSET + 4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[KIND_OFFSET] = self.kind.as_byte();
        buf[KIND_OFFSET + 1..PREV_OFFSET].fill(0);
        buf[PREV_OFFSET..PREV_OFFSET + 4].copy_from_slice(&self.prev_page_id.to_le_bytes());
        buf[NEXT_OFFSET..NEXT_OFFSET + 4].copy_from_slice(&self.next_page_id.to_le_bytes());
        buf[USED_OFFSET..USED_OFFSET + 2].copy_from_slice(&self.used_bytes.to_le_bytes());
        buf[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 2]
            .copy_from_slice(&self.slot_count.to_le_bytes());
        buf[NEXT_FREE_OFFSET..NEXT_FREE_OFFSET + 2]
            .copy_from_slice(&self.next_free_offset.to_le_bytes());
        buf[UNALIGNED_OFFSET..UNALIGNED_OFFSET + 2]
            .copy_from_slice(&self.unaligned_free_bytes.to_le_bytes());
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// Bounds checks a page read from disk must pass before it is trusted
    pub fn validate(&self) -> Result<()> {
        let directory_start = PAGE_SIZE - self.slot_count as usize * super::SLOT_SIZE;
        let next_free = self.next_free_offset as usize;

        let reason = if self.slot_count as usize > super::MAX_SLOTS {
            Some(format!("slot count {} exceeds {}", self.slot_count, super::MAX_SLOTS))
        } else if next_free < PAGE_HEADER_SIZE || next_free > directory_start {
            Some(format!(
                "next free offset {} outside [{}, {}]",
                next_free, PAGE_HEADER_SIZE, directory_start
            ))
        } else if self.used_bytes as usize + self.unaligned_free_bytes as usize
            > next_free - PAGE_HEADER_SIZE
        {
            Some(format!(
                "used ({}) + unaligned ({}) bytes exceed data area",
                self.used_bytes, self.unaligned_free_bytes
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CairnError::InvalidPage {
                page_id: self.page_id,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Read the kind byte without decoding the rest of the header
pub(crate) fn raw_kind(buf: &[u8]) -> u8 {
    buf[KIND_OFFSET]
}

/// Read the page id without decoding the rest of the header
pub(crate) fn raw_page_id(buf: &[u8]) -> PageId {
    read_u32(buf, ID_OFFSET)
}

/// CRC32 over the whole page, skipping the checksum field itself
pub(crate) fn compute_checksum(buf: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf[..CHECKSUM_OFFSET]);
    hasher.update(&[0u8; 4]);
    hasher.update(&buf[CHECKSUM_OFFSET + 4..]);
    hasher.finalize()
}

pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
