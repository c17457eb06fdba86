//! Tests for the slotted Page
//!
//! These tests verify:
//! - Header bookkeeping on insert and delete
//! - Gap reuse, defragmentation and slot stability
//! - Capacity limits (bytes and slot ids)
//! - Checksums and kind validation on load

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cairn::buffer::PageBuffer;
use cairn::page::{
    FillFactor, Page, PageKind, MAX_SLOTS, PAGE_BODY_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE,
};
use cairn::CairnError;

// =============================================================================
// Helper Functions
// =============================================================================

fn new_page(kind: PageKind) -> Page {
    Page::new(PageBuffer::detached(PAGE_SIZE), 3, kind)
}

fn insert_filled(page: &mut Page, len: usize, byte: u8) -> u8 {
    let (span, slot) = page.insert(len).unwrap();
    span.fill(byte);
    slot
}

fn live_bytes(page: &Page) -> usize {
    page.live_slots()
        .iter()
        .map(|(_, entry)| entry.length as usize)
        .sum()
}

/// Copy a sealed page into a fresh buffer, as a disk read would
fn reload(page: &mut Page) -> PageBuffer {
    let mut buffer = PageBuffer::detached(PAGE_SIZE);
    buffer.copy_from_slice(page.seal());
    buffer
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_new_page_is_empty() {
    let page = new_page(PageKind::Data);

    assert_eq!(page.id(), 3);
    assert_eq!(page.kind(), PageKind::Data);
    assert_eq!(page.used_bytes(), 0);
    assert_eq!(page.slot_count(), 0);
    assert_eq!(page.next_free_offset(), PAGE_HEADER_SIZE);
    assert_eq!(page.fill_factor(), FillFactor::Empty);
    assert_eq!(page.max_free_usable_bytes(), PAGE_BODY_SIZE - SLOT_SIZE);
    assert!(page.is_dirty());
}

#[test]
fn test_prev_next_links() {
    let mut page = new_page(PageKind::Index);
    page.set_prev_page_id(7);
    page.set_next_page_id(9);

    let page = Page::load_any(reload(&mut page)).unwrap();
    assert_eq!(page.prev_page_id(), 7);
    assert_eq!(page.next_page_id(), 9);
    assert!(!page.is_dirty());
}

// =============================================================================
// Insert / Read / Delete Tests
// =============================================================================

#[test]
fn test_insert_and_read() {
    let mut page = new_page(PageKind::Data);

    let slot = insert_filled(&mut page, 100, 0x11);

    assert_eq!(slot, 0);
    assert_eq!(page.slot_count(), 1);
    assert_eq!(page.used_bytes(), 100);
    assert_eq!(page.read(slot).unwrap(), &[0x11; 100][..]);
    assert_eq!(page.slot_entry(0).offset as usize, PAGE_HEADER_SIZE);
}

#[test]
fn test_used_bytes_matches_live_slots() {
    let mut page = new_page(PageKind::Data);

    for len in [10, 250, 3, 999, 42] {
        insert_filled(&mut page, len, 1);
        assert_eq!(page.used_bytes(), live_bytes(&page));
    }
    page.delete(1).unwrap();
    assert_eq!(page.used_bytes(), live_bytes(&page));
    page.delete(4).unwrap();
    assert_eq!(page.used_bytes(), live_bytes(&page));
}

#[test]
fn test_delete_frees_slot_for_reuse() {
    let mut page = new_page(PageKind::Data);
    insert_filled(&mut page, 10, 1);
    insert_filled(&mut page, 10, 2);
    insert_filled(&mut page, 10, 3);

    page.delete(1).unwrap();
    assert!(matches!(
        page.read(1),
        Err(CairnError::SlotNotFound { slot_id: 1, .. })
    ));
    assert_eq!(page.unaligned_free_bytes(), 10);

    let slot = insert_filled(&mut page, 5, 4);
    assert_eq!(slot, 1);
    assert_eq!(page.read(2).unwrap(), &[3u8; 10][..]);
}

#[test]
fn test_delete_last_slot_shrinks_directory() {
    let mut page = new_page(PageKind::Data);
    insert_filled(&mut page, 10, 1);
    insert_filled(&mut page, 10, 2);

    page.delete(1).unwrap();

    assert_eq!(page.slot_count(), 1);
    assert_eq!(page.next_free_offset(), PAGE_HEADER_SIZE + 10);
    assert_eq!(page.unaligned_free_bytes(), 0);
}

#[test]
fn test_delete_missing_slot() {
    let mut page = new_page(PageKind::Data);

    assert!(matches!(
        page.delete(0),
        Err(CairnError::SlotNotFound { slot_id: 0, .. })
    ));
}

#[test]
fn test_insert_reuses_gap_when_tail_is_full() {
    let mut page = new_page(PageKind::Data);
    insert_filled(&mut page, 4000, 0xAA);
    insert_filled(&mut page, 4000, 0xBB);
    page.delete(0).unwrap();

    let slot = insert_filled(&mut page, 3000, 0xCC);

    assert_eq!(slot, 0);
    assert_eq!(page.slot_entry(0).offset as usize, PAGE_HEADER_SIZE);
    assert_eq!(page.unaligned_free_bytes(), 1000);
    assert_eq!(page.read(1).unwrap(), &[0xBB; 4000][..]);
}

// =============================================================================
// Defrag Tests
// =============================================================================

#[test]
fn test_defrag_compacts_and_keeps_slot_ids() {
    let mut page = new_page(PageKind::Data);
    insert_filled(&mut page, 100, 1);
    insert_filled(&mut page, 100, 2);
    insert_filled(&mut page, 100, 3);
    page.delete(1).unwrap();
    assert_eq!(page.next_free_offset(), PAGE_HEADER_SIZE + 300);

    page.defrag();

    assert_eq!(page.next_free_offset(), PAGE_HEADER_SIZE + 200);
    assert_eq!(page.unaligned_free_bytes(), 0);
    assert_eq!(page.used_bytes(), 200);
    assert_eq!(page.read(0).unwrap(), &[1u8; 100][..]);
    assert_eq!(page.read(2).unwrap(), &[3u8; 100][..]);
    assert_eq!(page.slot_entry(2).offset as usize, PAGE_HEADER_SIZE + 100);
}

#[test]
fn test_defrag_restores_contiguous_space() {
    let mut page = new_page(PageKind::Data);
    for i in 0..8 {
        insert_filled(&mut page, 1000, i);
    }
    for slot in [1u8, 3, 5] {
        page.delete(slot).unwrap();
    }
    let before = page.get_max_contiguous_free_space();

    page.defrag();

    assert!(page.get_max_contiguous_free_space() > before);
    assert!(page.is_insert_possible(3000));
}

// =============================================================================
// Random Operation Tests
// =============================================================================

/// Compare every live slot against the expected contents
fn assert_matches_model(page: &Page, model: &BTreeMap<u8, Vec<u8>>, step: usize) {
    let expected_used: usize = model.values().map(Vec::len).sum();
    assert_eq!(page.used_bytes(), expected_used, "step {}", step);
    assert_eq!(page.used_bytes(), live_bytes(page), "step {}", step);
    assert_eq!(page.live_slots().len(), model.len(), "step {}", step);
    for (&slot, bytes) in model {
        assert_eq!(page.read(slot).unwrap(), &bytes[..], "step {} slot {}", step, slot);
    }
}

#[test]
fn test_random_inserts_deletes_and_defrags() {
    let mut rng = StdRng::seed_from_u64(0xCA1B);
    let mut page = new_page(PageKind::Data);
    let mut model: BTreeMap<u8, Vec<u8>> = BTreeMap::new();

    for step in 0..5_000 {
        match rng.gen_range(0..10) {
            0..=5 => {
                let len = rng.gen_range(1..=400);
                let possible = page.is_insert_possible(len);
                let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                match page.insert(len) {
                    Ok((span, slot)) => {
                        assert!(possible, "step {}: {} bytes fit unexpectedly", step, len);
                        span.copy_from_slice(&bytes);
                        assert!(model.insert(slot, bytes).is_none(), "slot {} reused live", slot);
                    }
                    Err(CairnError::PageFull { .. }) => {
                        assert!(!possible, "step {}: {} bytes should fit", step, len);
                    }
                    Err(e) => panic!("step {}: unexpected error {}", step, e),
                }
            }
            6..=8 if !model.is_empty() => {
                let index = rng.gen_range(0..model.len());
                let slot = *model.keys().nth(index).unwrap();
                page.delete(slot).unwrap();
                model.remove(&slot);
                assert!(matches!(page.read(slot), Err(CairnError::SlotNotFound { .. })));
            }
            _ => {
                page.defrag();
                assert_eq!(page.unaligned_free_bytes(), 0);
            }
        }
        assert_matches_model(&page, &model, step);
    }
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_page_full_on_oversized_insert() {
    let mut page = new_page(PageKind::Data);

    let result = page.insert(PAGE_BODY_SIZE - SLOT_SIZE + 1);

    assert!(matches!(result, Err(CairnError::PageFull { page_id: 3, .. })));
}

#[test]
fn test_page_full_after_filling() {
    let mut page = new_page(PageKind::Data);

    insert_filled(&mut page, PAGE_BODY_SIZE - SLOT_SIZE, 7);

    assert!(page.is_full());
    assert_eq!(page.max_free_usable_bytes(), 0);
    assert!(matches!(page.insert(1), Err(CairnError::PageFull { .. })));
}

#[test]
fn test_slot_ids_are_limited() {
    let mut page = new_page(PageKind::Data);

    for _ in 0..MAX_SLOTS {
        page.insert(1).unwrap();
    }

    assert_eq!(page.slot_count(), MAX_SLOTS);
    assert!(!page.is_insert_possible(1));
    assert!(matches!(page.insert(1), Err(CairnError::PageFull { .. })));
}

#[test]
fn test_append_unslotted() {
    let mut page = new_page(PageKind::Index);

    page.append_unslotted(12).unwrap().fill(9);
    page.append_unslotted(4).unwrap().fill(8);

    assert_eq!(page.slot_count(), 0);
    assert_eq!(page.used_bytes(), 16);
    assert_eq!(page.data_area().len(), 16);
    assert_eq!(&page.data_area()[12..], &[8u8; 4]);
    assert!(page.append_unslotted(PAGE_BODY_SIZE).is_err());
}

// =============================================================================
// Load / Checksum Tests
// =============================================================================

#[test]
fn test_load_round_trip_preserves_records() {
    let mut page = new_page(PageKind::Data);
    insert_filled(&mut page, 64, 0x5A);
    insert_filled(&mut page, 16, 0xA5);

    let loaded = Page::load(reload(&mut page), PageKind::Data).unwrap();

    loaded.verify_checksum().unwrap();
    assert_eq!(loaded.used_bytes(), 80);
    assert_eq!(loaded.read(1).unwrap(), &[0xA5; 16][..]);
}

#[test]
fn test_checksum_mismatch_detected() {
    let mut page = new_page(PageKind::Data);
    insert_filled(&mut page, 64, 0x5A);
    let mut buffer = reload(&mut page);
    buffer[PAGE_HEADER_SIZE + 10] ^= 0xFF;

    let loaded = Page::load(buffer, PageKind::Data).unwrap();

    assert!(matches!(
        loaded.verify_checksum(),
        Err(CairnError::ChecksumMismatch { page_id: 3, .. })
    ));
}

#[test]
fn test_load_rejects_wrong_kind() {
    let mut page = new_page(PageKind::Data);

    let result = Page::load(reload(&mut page), PageKind::Index);

    assert!(matches!(
        result,
        Err(CairnError::InvalidPageKind {
            page_id: 3,
            expected: PageKind::Index,
            found: 2,
        })
    ));
}

#[test]
fn test_load_rejects_inconsistent_header() {
    let mut page = new_page(PageKind::Data);
    let mut buffer = reload(&mut page);
    // next free offset below the header end
    buffer[20..22].copy_from_slice(&10u16.to_le_bytes());

    assert!(matches!(
        Page::load_any(buffer),
        Err(CairnError::InvalidPage { .. })
    ));
}

#[test]
fn test_load_rejects_short_buffer() {
    let buffer = PageBuffer::detached(PAGE_SIZE / 2);

    assert!(matches!(
        Page::load_any(buffer),
        Err(CairnError::InvalidBufferSize { .. })
    ));
}
