//! Tests for DataService
//!
//! These tests verify:
//! - Records round-trip through bincode and raw bytes
//! - Small records share pages
//! - Delete removes every block
//! - Invalid addresses and damaged chains are reported
//! - Batch, delayed and concurrent inserts
//! - The compression seam

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use cairn::config::{Config, DiskBackend};
use cairn::data::{BlockHeader, CompressionService, WriteMode, BLOCK_HEADER_SIZE};
use cairn::page::{DataPage, PageAddress, TypedPage};
use cairn::{CairnError, Engine};
use serde::{Deserialize, Serialize};

use crate::{payload, setup_memory_engine};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Customer {
    id: u64,
    name: String,
    tags: Vec<String>,
    notes: Vec<u8>,
}

fn customer(id: u64, notes: usize) -> Customer {
    Customer {
        id,
        name: format!("customer-{}", id),
        tags: vec!["retail".to_string(), "eu".to_string()],
        notes: payload(notes),
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_insert_and_get_value() {
    let engine = setup_memory_engine();
    let value = customer(1, 64);

    let address = engine.data().insert(&value).unwrap();
    let loaded: Customer = engine.data().get(address).unwrap();

    assert_eq!(loaded, value);
    assert_eq!(address, PageAddress::new(3, 0));
}

#[test]
fn test_large_value_spans_pages() {
    let engine = setup_memory_engine();
    let value = customer(2, 50_000);

    let address = engine.data().insert(&value).unwrap();

    assert!(engine.data().block_count(address).unwrap() >= 7);
    assert_eq!(engine.data().get::<Customer>(address).unwrap(), value);
}

#[test]
fn test_raw_bytes_round_trip() {
    let engine = setup_memory_engine();
    let bytes = payload(30_000);

    let address = engine.data().insert_bytes(&bytes, WriteMode::Immediate).unwrap();

    assert_eq!(engine.data().get_bytes(address).unwrap(), Bytes::from(bytes));
}

#[test]
fn test_empty_payload() {
    let engine = setup_memory_engine();

    let address = engine.data().insert_bytes(&[], WriteMode::Immediate).unwrap();

    assert!(engine.data().get_bytes(address).unwrap().is_empty());
    assert_eq!(engine.data().block_count(address).unwrap(), 1);
}

#[test]
fn test_small_records_share_a_page() {
    let engine = setup_memory_engine();

    let addresses: Vec<PageAddress> = (0..20)
        .map(|i| {
            engine
                .data()
                .insert_bytes(&payload(100 + i), WriteMode::Immediate)
                .unwrap()
        })
        .collect();

    assert!(addresses.iter().all(|a| a.page_id == 3));
    let slots: Vec<u8> = addresses.iter().map(|a| a.slot_id).collect();
    assert_eq!(slots, (0..20).collect::<Vec<u8>>());
}

#[test]
fn test_record_continues_after_partial_page() {
    let engine = setup_memory_engine();
    let small = engine.data().insert_bytes(&payload(1000), WriteMode::Immediate).unwrap();

    let big = engine.data().insert_bytes(&payload(10_000), WriteMode::Immediate).unwrap();

    assert_eq!(big.page_id, small.page_id);
    assert_eq!(engine.data().block_count(big).unwrap(), 2);
    assert_eq!(engine.data().get_bytes(big).unwrap(), Bytes::from(payload(10_000)));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_removes_all_blocks() {
    let engine = setup_memory_engine();
    let address = engine.data().insert_bytes(&payload(20_000), WriteMode::Immediate).unwrap();

    assert_eq!(engine.data().delete(address).unwrap(), 3);
    assert!(matches!(
        engine.data().get_bytes(address),
        Err(CairnError::SlotNotFound { .. })
    ));
}

#[test]
fn test_delete_leaves_neighbours() {
    let engine = setup_memory_engine();
    let a = engine.data().insert(&customer(1, 10)).unwrap();
    let b = engine.data().insert(&customer(2, 10)).unwrap();

    engine.data().delete(a).unwrap();

    assert_eq!(engine.data().get::<Customer>(b).unwrap(), customer(2, 10));
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_empty_address_rejected() {
    let engine = setup_memory_engine();

    assert!(matches!(
        engine.data().get_bytes(PageAddress::EMPTY),
        Err(CairnError::InvalidPage { .. })
    ));
}

#[test]
fn test_following_block_is_not_a_record() {
    let engine = setup_memory_engine();
    let address = engine.data().insert_bytes(&payload(20_000), WriteMode::Immediate).unwrap();
    let second = {
        let page = engine.pages().get_page::<DataPage>(address.page_id).unwrap().unwrap();
        let guard = page.read();
        BlockHeader::decode(guard.read(address.slot_id).unwrap()).next_block
    };

    assert!(matches!(
        engine.data().get_bytes(second),
        Err(CairnError::InvalidPage { .. })
    ));
}

#[test]
fn test_missing_page_reported() {
    let engine = setup_memory_engine();

    assert!(matches!(
        engine.data().get_bytes(PageAddress::new(900, 0)),
        Err(CairnError::PageNotFound { page_id: 900 })
    ));
}

#[test]
fn test_cyclic_chain_detected() {
    let engine = setup_memory_engine();
    let page = engine.pages().create_new_page::<DataPage>().unwrap();
    let page_id = page.id();
    let at = {
        let mut guard = page.write();
        let (span, slot) = guard.insert(BLOCK_HEADER_SIZE + 4).unwrap();
        let at = PageAddress::new(page_id, slot);
        let mut header = BlockHeader::new(false);
        header.next_block = at;
        header.encode(span);
        at
    };

    assert!(matches!(
        engine.data().get_bytes(at),
        Err(CairnError::Corruption(_))
    ));
}

#[test]
fn test_short_block_detected() {
    let engine = setup_memory_engine();
    let page = engine.pages().create_new_page::<DataPage>().unwrap();
    let slot = page.write().insert(4).unwrap().1;

    assert!(matches!(
        engine.data().get_bytes(PageAddress::new(page.id(), slot)),
        Err(CairnError::Corruption(_))
    ));
}

// =============================================================================
// Batch / Delayed / Concurrent Tests
// =============================================================================

#[test]
fn test_insert_batch() {
    let engine = setup_memory_engine();
    let values: Vec<Customer> = (0..50).map(|i| customer(i, (i as usize) * 300)).collect();

    let addresses = engine.data().insert_batch(&values).unwrap();

    assert_eq!(addresses.len(), values.len());
    assert_eq!(engine.stats().unwrap().pager.dirty_pages, 0);
    for (address, value) in addresses.iter().zip(&values) {
        assert_eq!(&engine.data().get::<Customer>(*address).unwrap(), value);
    }
}

#[test]
fn test_delayed_write_stays_dirty_until_checkpoint() {
    let engine = setup_memory_engine();

    let address = engine.data().insert_bytes(&payload(500), WriteMode::Delayed).unwrap();
    assert!(engine.stats().unwrap().pager.dirty_pages > 0);

    engine.checkpoint().unwrap();
    assert_eq!(engine.stats().unwrap().pager.dirty_pages, 0);
    assert_eq!(engine.data().get_bytes(address).unwrap(), Bytes::from(payload(500)));
}

#[test]
fn test_concurrent_inserts() {
    let engine = Arc::new(setup_memory_engine());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                (0..40u64)
                    .map(|i| {
                        let value = customer(t * 1000 + i, ((t + i) % 7) as usize * 1500);
                        (engine.data().insert(&value).unwrap(), value)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    for handle in handles {
        for (address, value) in handle.join().unwrap() {
            assert!(seen.insert(address), "address {} issued twice", address);
            assert_eq!(engine.data().get::<Customer>(address).unwrap(), value);
        }
    }
    assert_eq!(engine.stats().unwrap().pager.claimed_pages, 0);
}

// =============================================================================
// Compression Tests
// =============================================================================

/// Reverses the payload, so stored bytes differ from the input
struct Reversing;

impl CompressionService for Reversing {
    fn name(&self) -> &str {
        "reversing"
    }

    fn compress(&self, data: &[u8]) -> cairn::Result<Bytes> {
        Ok(data.iter().rev().copied().collect::<Vec<u8>>().into())
    }

    fn decompress(&self, data: &[u8]) -> cairn::Result<Bytes> {
        self.compress(data)
    }
}

#[test]
fn test_compression_is_applied() {
    let config = Config::builder().disk_backend(DiskBackend::Memory).build();
    let engine = Engine::open_with_compression(config, Arc::new(Reversing)).unwrap();

    let address = engine.data().insert_bytes(b"abc", WriteMode::Immediate).unwrap();

    let page = engine.pages().get_page::<DataPage>(address.page_id).unwrap().unwrap();
    assert_eq!(&page.read().read(address.slot_id).unwrap()[BLOCK_HEADER_SIZE..], b"cba");
    assert_eq!(&engine.data().get_bytes(address).unwrap()[..], b"abc");
}
