//! Slotted page
//!
//! The in-memory form of one page: a rented buffer plus its decoded common
//! header. Records are placed in the data area and located through the slot
//! directory at the end of the page.

use std::fmt;

use crate::buffer::PageBuffer;
use crate::error::{CairnError, Result};

use super::header::{self, PageHeader, CHECKSUM_OFFSET};
use super::{
    FillFactor, PageId, PageKind, COMMON_HEADER_SIZE, MAX_SLOTS, PAGE_BODY_SIZE,
    PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE,
};

/// One entry of the slot directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    pub offset: u16,
    pub length: u16,
}

impl SlotEntry {
    /// Empty and deleted entries are all zero; live data never starts at 0
    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    fn end(&self) -> usize {
        self.offset as usize + self.length as usize
    }
}

/// A page held in memory
pub struct Page {
    buffer: PageBuffer,
    header: PageHeader,
    dirty: bool,
}

impl Page {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Initialize `buffer` as a new empty page
    pub fn new(mut buffer: PageBuffer, page_id: PageId, kind: PageKind) -> Self {
        buffer.clear();
        let header = PageHeader::new(page_id, kind);
        header.encode(&mut buffer);
        Self {
            buffer,
            header,
            dirty: true,
        }
    }

    /// Wrap a buffer read from disk, checking that it holds a page of `expected` kind
    pub fn load(buffer: PageBuffer, expected: PageKind) -> Result<Self> {
        let found = header::raw_kind(&buffer);
        if found != expected.as_byte() {
            return Err(CairnError::InvalidPageKind {
                page_id: header::raw_page_id(&buffer),
                expected,
                found,
            });
        }
        Self::load_any(buffer)
    }

    /// Wrap a buffer read from disk, whatever its kind
    pub fn load_any(buffer: PageBuffer) -> Result<Self> {
        if buffer.len() != PAGE_SIZE {
            return Err(CairnError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }
        let header = PageHeader::decode(&buffer)?;
        header.validate()?;
        Ok(Self {
            buffer,
            header,
            dirty: false,
        })
    }

    /// Compare the stored checksum with the page contents
    pub fn verify_checksum(&self) -> Result<()> {
        let computed = header::compute_checksum(&self.buffer);
        if computed != self.header.checksum {
            return Err(CairnError::ChecksumMismatch {
                page_id: self.header.page_id,
                stored: self.header.checksum,
                computed,
            });
        }
        Ok(())
    }

    /// Write the header and checksum into the buffer and return the bytes to persist
    pub fn seal(&mut self) -> &[u8] {
        self.header.checksum = 0;
        self.header.encode(&mut self.buffer);
        let checksum = header::compute_checksum(&self.buffer);
        self.header.checksum = checksum;
        self.buffer[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
        &self.buffer
    }

    /// Give up the page and hand back its buffer
    pub fn into_buffer(self) -> PageBuffer {
        self.buffer
    }

    // =========================================================================
    // Header Accessors
    // =========================================================================

    pub fn id(&self) -> PageId {
        self.header.page_id
    }

    pub fn kind(&self) -> PageKind {
        self.header.kind
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn prev_page_id(&self) -> PageId {
        self.header.prev_page_id
    }

    pub fn set_prev_page_id(&mut self, page_id: PageId) {
        self.header.prev_page_id = page_id;
        self.touch();
    }

    pub fn next_page_id(&self) -> PageId {
        self.header.next_page_id
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        self.header.next_page_id = page_id;
        self.touch();
    }

    pub fn used_bytes(&self) -> usize {
        self.header.used_bytes as usize
    }

    pub fn slot_count(&self) -> usize {
        self.header.slot_count as usize
    }

    pub fn next_free_offset(&self) -> usize {
        self.header.next_free_offset as usize
    }

    pub fn unaligned_free_bytes(&self) -> usize {
        self.header.unaligned_free_bytes as usize
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Kind-specific half of the header (32 bytes)
    pub fn ext(&self) -> &[u8] {
        &self.buffer[COMMON_HEADER_SIZE..PAGE_HEADER_SIZE]
    }

    pub fn ext_mut(&mut self) -> &mut [u8] {
        self.touch();
        &mut self.buffer[COMMON_HEADER_SIZE..PAGE_HEADER_SIZE]
    }

    // =========================================================================
    // Raw Areas
    // =========================================================================

    /// Whole body after the header; bitmap and array pages use it directly
    pub fn body(&self) -> &[u8] {
        &self.buffer[PAGE_HEADER_SIZE..]
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        self.touch();
        &mut self.buffer[PAGE_HEADER_SIZE..]
    }

    /// Claim the whole body as used, for pages that do not use slots
    pub(crate) fn reserve_body(&mut self) {
        self.header.used_bytes = PAGE_BODY_SIZE as u16;
        self.header.next_free_offset = PAGE_SIZE as u16;
        self.header.unaligned_free_bytes = 0;
        self.touch();
    }

    /// Bytes written so far: `[header_end, next_free_offset)`
    pub fn data_area(&self) -> &[u8] {
        &self.buffer[PAGE_HEADER_SIZE..self.next_free_offset()]
    }

    pub fn data_area_mut(&mut self) -> &mut [u8] {
        self.touch();
        let end = self.next_free_offset();
        &mut self.buffer[PAGE_HEADER_SIZE..end]
    }

    /// Extend the data area by `length` bytes without a slot entry.
    ///
    /// Only for pages scanned sequentially from the header end; such pages
    /// never use `insert`/`delete`.
    pub fn append_unslotted(&mut self, length: usize) -> Result<&mut [u8]> {
        let tail = self.tail_space();
        if length > tail {
            return Err(CairnError::PageFull {
                page_id: self.id(),
                requested: length,
                available: tail,
            });
        }
        let offset = self.next_free_offset();
        self.header.next_free_offset = (offset + length) as u16;
        self.header.used_bytes += length as u16;
        self.touch();
        Ok(&mut self.buffer[offset..offset + length])
    }

    // =========================================================================
    // Slot Directory
    // =========================================================================

    fn entry_position(slot: usize) -> usize {
        PAGE_SIZE - (slot + 1) * SLOT_SIZE
    }

    /// Directory entry for `slot`; empty when beyond the directory
    pub fn slot_entry(&self, slot: usize) -> SlotEntry {
        if slot >= self.slot_count() {
            return SlotEntry {
                offset: 0,
                length: 0,
            };
        }
        let at = Self::entry_position(slot);
        SlotEntry {
            offset: header::read_u16(&self.buffer, at),
            length: header::read_u16(&self.buffer, at + 2),
        }
    }

    fn set_slot_entry(&mut self, slot: usize, entry: SlotEntry) {
        let at = Self::entry_position(slot);
        self.buffer[at..at + 2].copy_from_slice(&entry.offset.to_le_bytes());
        self.buffer[at + 2..at + 4].copy_from_slice(&entry.length.to_le_bytes());
    }

    /// Live slots in slot-id order
    pub fn live_slots(&self) -> Vec<(u8, SlotEntry)> {
        (0..self.slot_count())
            .map(|slot| (slot as u8, self.slot_entry(slot)))
            .filter(|(_, entry)| !entry.is_empty())
            .collect()
    }

    /// Live entries ordered by data offset
    fn entries_by_offset(&self) -> Vec<(usize, SlotEntry)> {
        let mut entries: Vec<(usize, SlotEntry)> = (0..self.slot_count())
            .map(|slot| (slot, self.slot_entry(slot)))
            .filter(|(_, entry)| !entry.is_empty())
            .collect();
        entries.sort_by_key(|(_, entry)| entry.offset);
        entries
    }

    fn first_empty_slot(&self) -> Option<usize> {
        (0..self.slot_count()).find(|&slot| self.slot_entry(slot).is_empty())
    }

    fn directory_start(&self) -> usize {
        PAGE_SIZE - self.slot_count() * SLOT_SIZE
    }

    fn tail_space(&self) -> usize {
        self.directory_start().saturating_sub(self.next_free_offset())
    }

    /// Free gaps between live records as `(offset, length)`, lowest offset first
    fn gaps(&self) -> Vec<(usize, usize)> {
        let mut gaps = Vec::new();
        let mut cursor = PAGE_HEADER_SIZE;
        for (_, entry) in self.entries_by_offset() {
            let start = entry.offset as usize;
            if start > cursor {
                gaps.push((cursor, start - cursor));
            }
            cursor = cursor.max(entry.end());
        }
        gaps
    }

    /// Slot-entry bytes a new insert needs, or `None` when no slot id is left
    fn slot_cost(&self) -> Option<usize> {
        if self.first_empty_slot().is_some() {
            Some(0)
        } else if self.slot_count() < MAX_SLOTS {
            Some(SLOT_SIZE)
        } else {
            None
        }
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Allocate `length` bytes and a slot for them.
    ///
    /// Extends the data area when the tail has room; otherwise reuses the
    /// lowest freed gap that fits.
    pub fn insert(&mut self, length: usize) -> Result<(&mut [u8], u8)> {
        let Some(slot_cost) = self.slot_cost() else {
            return Err(self.page_full(length));
        };
        let tail = self.tail_space();

        let offset = if slot_cost <= tail && length <= tail - slot_cost {
            let offset = self.next_free_offset();
            self.header.next_free_offset = (offset + length) as u16;
            offset
        } else if slot_cost <= tail && length <= self.unaligned_free_bytes() {
            let gap = self.gaps().into_iter().find(|&(_, gap)| gap >= length);
            let Some((offset, _)) = gap else {
                return Err(self.page_full(length));
            };
            self.header.unaligned_free_bytes -= length as u16;
            offset
        } else {
            return Err(self.page_full(length));
        };

        let slot = match self.first_empty_slot() {
            Some(slot) => slot,
            None => {
                self.header.slot_count += 1;
                self.slot_count() - 1
            }
        };
        self.set_slot_entry(
            slot,
            SlotEntry {
                offset: offset as u16,
                length: length as u16,
            },
        );
        self.header.used_bytes += length as u16;
        self.touch();

        Ok((&mut self.buffer[offset..offset + length], slot as u8))
    }

    /// Remove the record in `slot`, zeroing its bytes
    pub fn delete(&mut self, slot: u8) -> Result<()> {
        let index = slot as usize;
        let entry = self.slot_entry(index);
        if entry.is_empty() {
            return Err(CairnError::SlotNotFound {
                page_id: self.id(),
                slot_id: slot,
            });
        }

        self.buffer[entry.offset as usize..entry.end()].fill(0);
        self.set_slot_entry(index, SlotEntry { offset: 0, length: 0 });
        self.header.used_bytes -= entry.length;

        if index + 1 == self.slot_count() {
            while self.slot_count() > 0 && self.slot_entry(self.slot_count() - 1).is_empty() {
                self.header.slot_count -= 1;
            }
        }

        let data_end = self
            .entries_by_offset()
            .iter()
            .map(|(_, entry)| entry.end())
            .max()
            .unwrap_or(PAGE_HEADER_SIZE);
        self.header.next_free_offset = data_end as u16;
        self.header.unaligned_free_bytes =
            (data_end - PAGE_HEADER_SIZE - self.used_bytes()) as u16;
        self.touch();
        Ok(())
    }

    /// Compact live records toward the header end; slot ids are unchanged
    pub fn defrag(&mut self) {
        let mut cursor = PAGE_HEADER_SIZE;
        for (slot, entry) in self.entries_by_offset() {
            let start = entry.offset as usize;
            if start != cursor {
                self.buffer.copy_within(start..entry.end(), cursor);
                self.set_slot_entry(
                    slot,
                    SlotEntry {
                        offset: cursor as u16,
                        length: entry.length,
                    },
                );
            }
            cursor += entry.length as usize;
        }

        let old_end = self.next_free_offset();
        if old_end > cursor {
            self.buffer[cursor..old_end].fill(0);
        }
        self.header.next_free_offset = cursor as u16;
        self.header.unaligned_free_bytes = 0;
        self.touch();
    }

    /// Record bytes stored in `slot`
    pub fn read(&self, slot: u8) -> Result<&[u8]> {
        let entry = self.slot_entry(slot as usize);
        if entry.is_empty() {
            return Err(CairnError::SlotNotFound {
                page_id: self.id(),
                slot_id: slot,
            });
        }
        Ok(&self.buffer[entry.offset as usize..entry.end()])
    }

    /// Mutable record bytes stored in `slot`
    pub fn slot_mut(&mut self, slot: u8) -> Result<&mut [u8]> {
        let entry = self.slot_entry(slot as usize);
        if entry.is_empty() {
            return Err(CairnError::SlotNotFound {
                page_id: self.id(),
                slot_id: slot,
            });
        }
        self.touch();
        Ok(&mut self.buffer[entry.offset as usize..entry.end()])
    }

    // =========================================================================
    // Free Space Queries
    // =========================================================================

    /// Largest free run: the tail before the directory or any gap between records
    pub fn get_max_contiguous_free_space(&self) -> usize {
        let largest_gap = self.gaps().into_iter().map(|(_, len)| len).max().unwrap_or(0);
        self.tail_space().max(largest_gap)
    }

    /// Largest record `insert` can accept right now
    pub fn max_free_usable_bytes(&self) -> usize {
        let Some(slot_cost) = self.slot_cost() else {
            return 0;
        };
        let tail = self.tail_space();
        if slot_cost > tail {
            return 0;
        }
        let largest_gap = self.gaps().into_iter().map(|(_, len)| len).max().unwrap_or(0);
        (tail - slot_cost).max(largest_gap.min(self.unaligned_free_bytes()))
    }

    pub fn is_insert_possible(&self, length: usize) -> bool {
        length <= self.max_free_usable_bytes()
    }

    pub fn is_full(&self) -> bool {
        self.fill_factor() == FillFactor::Full
    }

    /// Occupancy bucket: data plus directory over the page body
    pub fn fill_factor(&self) -> FillFactor {
        let occupied = self.used_bytes() + self.slot_count() * SLOT_SIZE;
        FillFactor::from_usage(occupied, self.max_free_usable_bytes())
    }

    fn page_full(&self, requested: usize) -> CairnError {
        CairnError::PageFull {
            page_id: self.id(),
            requested,
            available: self.max_free_usable_bytes(),
        }
    }

    fn touch(&mut self) {
        self.header.encode(&mut self.buffer);
        self.dirty = true;
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("header", &self.header)
            .field("dirty", &self.dirty)
            .finish()
    }
}
