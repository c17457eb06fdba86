//! Tests shared by every DiskService backend
//!
//! These tests verify:
//! - Pages land at `id * PAGE_SIZE` and read back unchanged
//! - Reads past the end report PageNotFound
//! - Holes left by out-of-order writes read back as zeros
//! - Buffer size validation
//! - File-backed pages survive reopening

use std::sync::Arc;

use cairn::buffer::{BufferPool, ManagedPool};
use cairn::config::{Config, DiskBackend};
use cairn::disk::{open_disk, page_offset, DiskService, MemoryDisk};
use cairn::page::PAGE_SIZE;
use cairn::CairnError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const FILE_BACKENDS: [DiskBackend; 3] = [
    DiskBackend::Stream,
    DiskBackend::RandomAccess,
    DiskBackend::MemoryMapped,
];

fn pool() -> Arc<dyn BufferPool> {
    Arc::new(ManagedPool::new(PAGE_SIZE, 16))
}

fn setup_temp_disk(backend: DiskBackend) -> (TempDir, Config, Arc<dyn DiskService>) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("pages.db"))
        .disk_backend(backend)
        .mmap_chunk_pages(4)
        .build();
    let disk = open_disk(&config, pool()).unwrap();
    (temp_dir, config, disk)
}

fn page_of(byte: u8) -> Vec<u8> {
    let mut page = vec![byte; PAGE_SIZE];
    page[0] = byte.wrapping_add(1);
    page
}

fn check_write_read(disk: &dyn DiskService) {
    disk.write_page(0, &page_of(0x10)).unwrap();
    disk.write_page(1, &page_of(0x20)).unwrap();
    disk.write_page(1, &page_of(0x30)).unwrap();

    assert_eq!(&disk.read_page(0).unwrap()[..], &page_of(0x10)[..]);
    assert_eq!(&disk.read_page(1).unwrap()[..], &page_of(0x30)[..]);
}

fn check_holes(disk: &dyn DiskService) {
    disk.write_page(5, &page_of(0x55)).unwrap();

    assert!(disk.page_count().unwrap() >= 6);
    assert!(disk.read_page(3).unwrap().iter().all(|&b| b == 0));
    assert_eq!(&disk.read_page(5).unwrap()[..], &page_of(0x55)[..]);
}

// =============================================================================
// Offset Tests
// =============================================================================

#[test]
fn test_page_offset() {
    assert_eq!(page_offset(0), 0);
    assert_eq!(page_offset(3), 3 * PAGE_SIZE as u64);
    assert_eq!(page_offset(u32::MAX), u32::MAX as u64 * PAGE_SIZE as u64);
}

// =============================================================================
// Memory Backend Tests
// =============================================================================

#[test]
fn test_memory_write_read() {
    let disk = MemoryDisk::new(pool());
    check_write_read(&disk);
    assert_eq!(disk.page_count().unwrap(), 2);
}

#[test]
fn test_memory_holes() {
    let disk = MemoryDisk::new(pool());
    check_holes(&disk);
    assert_eq!(disk.page_count().unwrap(), 6);
}

#[test]
fn test_memory_read_past_end() {
    let disk = MemoryDisk::new(pool());

    assert!(matches!(
        disk.read_page(0),
        Err(CairnError::PageNotFound { page_id: 0 })
    ));
}

#[test]
fn test_memory_rejects_wrong_length() {
    let disk = MemoryDisk::new(pool());

    assert!(matches!(
        disk.write_page(0, &[0u8; 100]),
        Err(CairnError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: 100
        })
    ));
}

// =============================================================================
// File Backend Tests
// =============================================================================

#[test]
fn test_file_backends_write_read() {
    for backend in FILE_BACKENDS {
        let (_temp, _config, disk) = setup_temp_disk(backend);
        check_write_read(&*disk);
    }
}

#[test]
fn test_file_backends_holes() {
    for backend in FILE_BACKENDS {
        let (_temp, _config, disk) = setup_temp_disk(backend);
        check_holes(&*disk);
    }
}

#[test]
fn test_file_backends_read_past_end() {
    for backend in [DiskBackend::Stream, DiskBackend::RandomAccess] {
        let (_temp, _config, disk) = setup_temp_disk(backend);
        disk.write_page(0, &page_of(1)).unwrap();

        assert!(matches!(
            disk.read_page(1),
            Err(CairnError::PageNotFound { page_id: 1 })
        ));
        assert_eq!(disk.page_count().unwrap(), 1);
    }
}

#[test]
fn test_file_backends_reject_wrong_length() {
    for backend in FILE_BACKENDS {
        let (_temp, _config, disk) = setup_temp_disk(backend);

        assert!(matches!(
            disk.write_page(0, &vec![0u8; PAGE_SIZE + 1]),
            Err(CairnError::InvalidBufferSize { .. })
        ));
    }
}

#[test]
fn test_file_backends_persist_across_reopen() {
    for backend in FILE_BACKENDS {
        let (_temp, config, disk) = setup_temp_disk(backend);
        disk.write_page(0, &page_of(0x01)).unwrap();
        disk.write_page(2, &page_of(0x02)).unwrap();
        disk.flush().unwrap();
        drop(disk);

        let disk = open_disk(&config, pool()).unwrap();
        assert_eq!(&disk.read_page(0).unwrap()[..], &page_of(0x01)[..]);
        assert_eq!(&disk.read_page(2).unwrap()[..], &page_of(0x02)[..]);
    }
}

#[test]
fn test_open_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("pages.db");
    let config = Config::builder().path(&path).build();

    let disk = open_disk(&config, pool()).unwrap();
    disk.write_page(0, &page_of(9)).unwrap();

    assert!(path.exists());
}

#[test]
fn test_read_uses_pool_buffers() {
    let pool = pool();
    let disk = MemoryDisk::new(Arc::clone(&pool));
    disk.write_page(0, &page_of(1)).unwrap();

    let buffer = disk.read_page(0).unwrap();
    assert_eq!(pool.stats().rented, 1);
    drop(buffer);
    assert_eq!(pool.stats().rented, 0);
}
