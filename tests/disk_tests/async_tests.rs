//! Tests for the AsyncDisk facade

use std::sync::Arc;

use cairn::buffer::{BufferPool, ManagedPool};
use cairn::disk::{AsyncDisk, DiskService, MemoryDisk, RandomAccessDisk};
use cairn::page::PAGE_SIZE;
use cairn::CairnError;
use tempfile::TempDir;

#[tokio::test]
async fn test_async_write_then_read() {
    let pool: Arc<dyn BufferPool> = Arc::new(ManagedPool::new(PAGE_SIZE, 8));
    let disk = AsyncDisk::new(Arc::new(MemoryDisk::new(Arc::clone(&pool))));

    let mut buffer = pool.rent().unwrap();
    buffer.fill(0x42);
    let buffer = disk.write_page(3, buffer).await.unwrap();
    assert!(buffer.iter().all(|&b| b == 0x42));

    let read = disk.read_page(3).await.unwrap();
    assert_eq!(&read[..], &buffer[..]);
    assert_eq!(disk.page_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_async_read_missing_page() {
    let pool: Arc<dyn BufferPool> = Arc::new(ManagedPool::new(PAGE_SIZE, 8));
    let disk = AsyncDisk::new(Arc::new(MemoryDisk::new(pool)));

    assert!(matches!(
        disk.read_page(0).await,
        Err(CairnError::PageNotFound { page_id: 0 })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_concurrent_writes_on_file() {
    let temp_dir = TempDir::new().unwrap();
    let pool: Arc<dyn BufferPool> = Arc::new(ManagedPool::new(PAGE_SIZE, 32));
    let path = temp_dir.path().join("a.db");
    let inner = Arc::new(RandomAccessDisk::open(&path, Arc::clone(&pool)).unwrap());
    let disk = AsyncDisk::new(inner.clone());

    let mut tasks = Vec::new();
    for page_id in 0..16u32 {
        let disk = disk.clone();
        let mut buffer = pool.rent().unwrap();
        buffer.fill(page_id as u8);
        tasks.push(tokio::spawn(async move { disk.write_page(page_id, buffer).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    disk.flush().await.unwrap();

    for page_id in 0..16u32 {
        let page = inner.read_page(page_id).unwrap();
        assert!(page.iter().all(|&b| b == page_id as u8));
    }
}
