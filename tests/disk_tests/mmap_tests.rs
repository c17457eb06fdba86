//! Tests for MmapDisk growth

use std::sync::Arc;

use cairn::buffer::ManagedPool;
use cairn::disk::{DiskService, MmapDisk};
use cairn::page::PAGE_SIZE;
use tempfile::TempDir;

#[test]
fn test_new_file_maps_one_chunk() {
    let temp_dir = TempDir::new().unwrap();
    let pool = Arc::new(ManagedPool::new(PAGE_SIZE, 4));

    let disk = MmapDisk::open(&temp_dir.path().join("m.db"), pool, 2).unwrap();

    assert_eq!(disk.mapped_len(), 2 * PAGE_SIZE);
    assert_eq!(disk.page_count().unwrap(), 0);
}

#[test]
fn test_write_past_mapping_remaps_in_chunks() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("m.db");
    let pool = Arc::new(ManagedPool::new(PAGE_SIZE, 4));
    let disk = MmapDisk::open(&path, pool, 2).unwrap();

    disk.write_page(0, &vec![1u8; PAGE_SIZE]).unwrap();
    disk.write_page(4, &vec![4u8; PAGE_SIZE]).unwrap();

    assert_eq!(disk.mapped_len(), 6 * PAGE_SIZE);
    assert_eq!(disk.page_count().unwrap(), 5);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 6 * PAGE_SIZE as u64);
    assert!(disk.read_page(0).unwrap().iter().all(|&b| b == 1));
    assert!(disk.read_page(4).unwrap().iter().all(|&b| b == 4));
}

#[test]
fn test_zero_chunk_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let pool = Arc::new(ManagedPool::new(PAGE_SIZE, 4));

    assert!(MmapDisk::open(&temp_dir.path().join("m.db"), pool, 0).is_err());
}
