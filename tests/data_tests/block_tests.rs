//! Tests for block chaining

use cairn::data::{BlockHeader, WriteMode, BLOCK_HEADER_SIZE};
use cairn::page::{DataPage, PageAddress, TypedPage, PAGE_BODY_SIZE, SLOT_SIZE};

use crate::{payload, setup_memory_engine};

/// Payload bytes one block can carry on an empty page
const BLOCK_CAPACITY: usize = PAGE_BODY_SIZE - SLOT_SIZE - BLOCK_HEADER_SIZE;

fn expected_blocks(len: usize) -> usize {
    len.div_ceil(BLOCK_CAPACITY).max(1)
}

#[test]
fn test_block_header_layout() {
    let mut buf = [0u8; BLOCK_HEADER_SIZE];
    let mut header = BlockHeader::new(true);
    header.next_block = PageAddress::new(9, 2);

    header.encode(&mut buf);

    assert_eq!(BLOCK_HEADER_SIZE, 10);
    assert_eq!(&buf[..5], &[9, 0, 0, 0, 2]);
    assert_eq!(buf[8], 1);
    assert_eq!(BlockHeader::decode(&buf), header);

    BlockHeader::link(&mut buf, PageAddress::new(12, 0));
    let relinked = BlockHeader::decode(&buf);
    assert_eq!(relinked.next_block, PageAddress::new(12, 0));
    assert!(relinked.is_following_block);
}

#[test]
fn test_block_capacity() {
    assert_eq!(BLOCK_CAPACITY, 8114);
}

#[test]
fn test_block_count_matches_payload_size() {
    for len in [0, 1, 100, BLOCK_CAPACITY, BLOCK_CAPACITY + 1, 20_000, 100_000] {
        let engine = setup_memory_engine();

        let address = engine
            .data()
            .insert_bytes(&payload(len), WriteMode::Immediate)
            .unwrap();

        assert_eq!(
            engine.data().block_count(address).unwrap(),
            expected_blocks(len),
            "payload of {} bytes",
            len
        );
    }
}

#[test]
fn test_chain_flags_and_links() {
    let engine = setup_memory_engine();
    let address = engine
        .data()
        .insert_bytes(&payload(20_000), WriteMode::Immediate)
        .unwrap();

    let mut current = address;
    let mut flags = Vec::new();
    while !current.is_empty() {
        let page = engine
            .pages()
            .get_page::<DataPage>(current.page_id)
            .unwrap()
            .unwrap();
        let header = BlockHeader::decode(page.read().read(current.slot_id).unwrap());
        flags.push(header.is_following_block);
        current = header.next_block;
    }

    assert_eq!(flags, vec![false, true, true]);
}

#[test]
fn test_full_blocks_fill_their_pages() {
    let engine = setup_memory_engine();
    let address = engine
        .data()
        .insert_bytes(&payload(BLOCK_CAPACITY * 2), WriteMode::Immediate)
        .unwrap();

    let first = engine
        .pages()
        .get_page::<DataPage>(address.page_id)
        .unwrap()
        .unwrap();

    assert!(first.read().is_full());
    assert_eq!(engine.data().block_count(address).unwrap(), 2);
}
