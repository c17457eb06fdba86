//! Tests for the allocation information maps
//!
//! These tests verify:
//! - Placement of AIM pages inside a GAM range
//! - Mapping from a page to the AIM describing it
//! - Entry add/update/lookup and free-space search

use cairn::alloc::{
    aim_page_id_for, first_aim_page_id, gam_id_for, get_next_aim_page_id,
    is_allocation_information_page, AllocationInformationMap, AIM_STRIDE, ENTRIES_PER_AIM,
    PAGES_PER_GAM,
};
use cairn::buffer::PageBuffer;
use cairn::page::{FillFactor, PageKind, PAGE_SIZE};
use cairn::CairnError;

// =============================================================================
// Helper Functions
// =============================================================================

fn new_aim(id: u32) -> AllocationInformationMap {
    AllocationInformationMap::create(PageBuffer::detached(PAGE_SIZE), id).unwrap()
}

// =============================================================================
// Interleave Arithmetic Tests
// =============================================================================

#[test]
fn test_aim_constants() {
    assert_eq!(ENTRIES_PER_AIM, 1354);
    assert_eq!(AIM_STRIDE, 1355);
}

#[test]
fn test_aim_positions() {
    assert!(is_allocation_information_page(2));
    assert!(is_allocation_information_page(1357));
    assert!(is_allocation_information_page(2 + 2 * AIM_STRIDE));

    assert!(!is_allocation_information_page(0));
    assert!(!is_allocation_information_page(1));
    assert!(!is_allocation_information_page(3));
    assert!(!is_allocation_information_page(1356));
}

#[test]
fn test_aim_for_page() {
    assert_eq!(aim_page_id_for(3), Some(2));
    assert_eq!(aim_page_id_for(1356), Some(2));
    assert_eq!(aim_page_id_for(1358), Some(1357));

    assert_eq!(aim_page_id_for(0), None);
    assert_eq!(aim_page_id_for(1), None);
    assert_eq!(aim_page_id_for(2), None);
    assert_eq!(aim_page_id_for(1357), None);
}

#[test]
fn test_gam_for_page() {
    assert_eq!(gam_id_for(0), None);
    assert_eq!(gam_id_for(1), Some(1));
    assert_eq!(gam_id_for(PAGES_PER_GAM), Some(1));
    assert_eq!(gam_id_for(PAGES_PER_GAM + 1), Some(PAGES_PER_GAM + 1));
    assert_eq!(first_aim_page_id(PAGES_PER_GAM + 1), PAGES_PER_GAM + 2);
}

#[test]
fn test_next_aim_page() {
    assert_eq!(get_next_aim_page_id(2).unwrap(), 1357);
    assert_eq!(get_next_aim_page_id(1357).unwrap(), 1357 + AIM_STRIDE);
}

#[test]
fn test_next_aim_rolls_into_next_range() {
    let mut aim = 2;
    while let Ok(next) = get_next_aim_page_id(aim) {
        if next > PAGES_PER_GAM {
            assert_eq!(next, 65_026);
            assert_eq!(aim, 2 + 47 * AIM_STRIDE);
            return;
        }
        aim = next;
    }
    panic!("AIM chain never left the first range");
}

#[test]
fn test_next_aim_rejects_non_aim() {
    assert!(matches!(
        get_next_aim_page_id(3),
        Err(CairnError::InvalidPage { page_id: 3, .. })
    ));
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_create_rejects_wrong_position() {
    let result = AllocationInformationMap::create(PageBuffer::detached(PAGE_SIZE), 3);

    assert!(matches!(result, Err(CairnError::InvalidPage { page_id: 3, .. })));
}

#[test]
fn test_add_and_get_entry() {
    let mut aim = new_aim(2);

    aim.add_entry(3, PageKind::Data, FillFactor::Empty).unwrap();
    aim.add_entry(5, PageKind::Index, FillFactor::Low).unwrap();

    let entry = aim.get_entry(5).unwrap().unwrap();
    assert_eq!(entry.page_id, 5);
    assert_eq!(entry.kind, PageKind::Index);
    assert_eq!(entry.fill, FillFactor::Low);
    assert_eq!(aim.get_entry(4).unwrap(), None);
    assert_eq!(aim.entries().unwrap().len(), 2);
}

#[test]
fn test_entry_outside_aim() {
    let mut aim = new_aim(2);

    assert!(matches!(
        aim.add_entry(1358, PageKind::Data, FillFactor::Empty),
        Err(CairnError::InvalidPage { page_id: 1358, .. })
    ));
    assert!(aim.get_entry(2).is_err());
}

#[test]
fn test_update_entry() {
    let mut aim = new_aim(2);
    aim.add_entry(3, PageKind::Data, FillFactor::Empty).unwrap();

    aim.update_entry(3, FillFactor::Medium).unwrap();

    assert_eq!(aim.get_entry(3).unwrap().unwrap().fill, FillFactor::Medium);
    assert!(matches!(
        aim.update_entry(4, FillFactor::Low),
        Err(CairnError::PageNotFound { page_id: 4 })
    ));
}

#[test]
fn test_find_page_with_free_space() {
    let mut aim = new_aim(2);
    aim.add_entry(3, PageKind::Index, FillFactor::Empty).unwrap();
    aim.add_entry(4, PageKind::Data, FillFactor::Full).unwrap();
    aim.add_entry(5, PageKind::Data, FillFactor::Medium).unwrap();

    assert_eq!(
        aim.find_page_with_free_space(PageKind::Data, FillFactor::High).unwrap(),
        Some(5)
    );
    assert_eq!(
        aim.find_page_with_free_space(PageKind::Data, FillFactor::Low).unwrap(),
        None
    );
    assert_eq!(
        aim.find_page_with_free_space(PageKind::Table, FillFactor::Full).unwrap(),
        None
    );
}

#[test]
fn test_last_entry_of_aim() {
    let mut aim = new_aim(2);
    let last = 2 + ENTRIES_PER_AIM;

    aim.add_entry(last, PageKind::Data, FillFactor::Low).unwrap();

    assert_eq!(aim_page_id_for(last), Some(2));
    assert_eq!(aim.get_entry(last).unwrap().unwrap().page_id, last);
}
