//! Heap index
//!
//! Unordered keys appended to a chain of Index pages.
//!
//! ## Entry Layout
//! ```text
//! ┌──────────┬─────────────┬─────────┬──────────────┐
//! │ code (1) │ address (8) │ len (1) │ value (len)  │
//! └──────────┴─────────────┴─────────┴──────────────┘
//! ```
//! Entries are packed back to back from the header end with no slots, so a
//! page is read by stepping `1 + 8 + 1 + len` bytes at a time. A deleted entry
//! keeps its length and has its code replaced by `TOMBSTONE`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{CairnError, Result};
use crate::page::{IndexPage, PageAddress, PageId, TypedPage, NO_PAGE, PAGE_ADDRESS_SIZE};
use crate::pager::PageService;

use super::{Index, IndexKey, IndexMeta, IndexStrategy};

/// Type code of a deleted entry
pub const TOMBSTONE: u8 = 0xFF;

const ENTRY_PREFIX: usize = 1 + PAGE_ADDRESS_SIZE + 1;

// =============================================================================
// HeapKey
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HeapKey {
    pub key: IndexKey,
    pub address: PageAddress,
}

impl HeapKey {
    pub fn new(key: IndexKey, address: PageAddress) -> Self {
        Self { key, address }
    }

    /// Bytes the entry occupies
    pub fn encoded_len(&self) -> usize {
        ENTRY_PREFIX + self.key.value_len()
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let value_len = self.key.value_len();
        buf[0] = self.key.type_code();
        self.address.encode(&mut buf[1..1 + PAGE_ADDRESS_SIZE]);
        buf[1 + PAGE_ADDRESS_SIZE] = value_len as u8;
        self.key.write_value(&mut buf[ENTRY_PREFIX..ENTRY_PREFIX + value_len]);
    }

    /// Decode the entry at the start of `buf`; `None` for a tombstone
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        let len = Self::entry_len(buf)?;
        if buf[0] == TOMBSTONE {
            return Ok(None);
        }
        let key = IndexKey::from_parts(buf[0], &buf[ENTRY_PREFIX..len])?;
        let address = PageAddress::decode(&buf[1..1 + PAGE_ADDRESS_SIZE]);
        Ok(Some(Self { key, address }))
    }

    /// Length of the entry at the start of `buf`, live or deleted
    pub fn entry_len(buf: &[u8]) -> Result<usize> {
        if buf.len() < ENTRY_PREFIX {
            return Err(CairnError::Corruption(format!(
                "truncated heap entry: {} bytes",
                buf.len()
            )));
        }
        let len = ENTRY_PREFIX + buf[1 + PAGE_ADDRESS_SIZE] as usize;
        if len > buf.len() {
            return Err(CairnError::Corruption(format!(
                "heap entry of {} bytes overruns page data ({} bytes left)",
                len,
                buf.len()
            )));
        }
        Ok(len)
    }
}

// =============================================================================
// HeapIndex
// =============================================================================

/// Position of a live entry: page and byte offset inside its data area
struct Located {
    page: IndexPage,
    offset: usize,
    entry: HeapKey,
}

pub struct HeapIndex {
    pages: Arc<PageService>,
    root: PageId,
    /// Serializes writers; readers scan without it
    write_lock: Mutex<()>,
}

impl HeapIndex {
    /// Create an empty heap index rooted at a new Index page
    pub fn create(pages: Arc<PageService>) -> Result<Self> {
        let root = pages.create_new_page::<IndexPage>()?;
        let root_id = root.id();
        IndexMeta::start(IndexStrategy::Heap, root_id, 0).write(&mut root.write());
        pages.write_page(&root)?;
        debug!("Created heap index at page {}", root_id);

        Ok(Self {
            pages,
            root: root_id,
            write_lock: Mutex::new(()),
        })
    }

    /// Open the heap index whose start page is `root`
    pub fn open(pages: Arc<PageService>, root: PageId) -> Result<Self> {
        let index = Self {
            pages,
            root,
            write_lock: Mutex::new(()),
        };
        let meta = index.root_meta()?;
        if !meta.is_start || meta.strategy != IndexStrategy::Heap {
            return Err(CairnError::InvalidPage {
                page_id: root,
                reason: "not the start page of a heap index".to_string(),
            });
        }
        Ok(index)
    }

    /// Live entries recorded in the start page
    pub fn len(&self) -> Result<u64> {
        Ok(self.root_meta()?.entry_count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Pages in the chain, start page included
    pub fn page_ids(&self) -> Result<Vec<PageId>> {
        let mut ids = Vec::new();
        let mut current = self.root;
        while current != NO_PAGE {
            ids.push(current);
            current = self.page(current)?.read().next_page_id();
        }
        Ok(ids)
    }

    fn page(&self, page_id: PageId) -> Result<IndexPage> {
        self.pages
            .get_page::<IndexPage>(page_id)?
            .ok_or(CairnError::PageNotFound { page_id })
    }

    fn root_meta(&self) -> Result<IndexMeta> {
        IndexMeta::read(&self.page(self.root)?.read())
    }

    /// Visit every entry in chain order; stops early when `visit` returns true
    fn scan(
        &self,
        mut visit: impl FnMut(&IndexPage, usize, Option<HeapKey>) -> Result<bool>,
    ) -> Result<()> {
        let mut current = self.root;
        while current != NO_PAGE {
            let page = self.page(current)?;
            let entries = {
                let guard = page.read();
                let data = guard.data_area();
                let mut entries = Vec::new();
                let mut offset = 0;
                while offset < data.len() {
                    let len = HeapKey::entry_len(&data[offset..])?;
                    entries.push((offset, HeapKey::decode(&data[offset..offset + len])?));
                    offset += len;
                }
                current = guard.next_page_id();
                entries
            };
            for (offset, entry) in entries {
                if visit(&page, offset, entry)? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn locate(&self, key: &IndexKey) -> Result<Option<Located>> {
        let mut found = None;
        self.scan(|page, offset, entry| match entry {
            Some(entry) if entry.key == *key => {
                found = Some(Located {
                    page: page.clone(),
                    offset,
                    entry,
                });
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(found)
    }

    /// Append `entry` to the tail page, linking a new page when it is full
    fn append(&self, entry: &HeapKey) -> Result<()> {
        let root = self.page(self.root)?;
        let mut meta = IndexMeta::read(&root.read())?;
        let tail = self.page(meta.tail_page_id)?;
        let len = entry.encoded_len();

        let target = if tail.read().is_insert_possible(len) {
            tail
        } else {
            let next = self.pages.create_new_page::<IndexPage>()?;
            let next_id = next.id();
            {
                let mut guard = next.write();
                IndexMeta::continuation(IndexStrategy::Heap).write(&mut guard);
                guard.set_prev_page_id(tail.id());
            }
            tail.write().set_next_page_id(next_id);
            self.pages.write_page(&tail)?;
            meta.tail_page_id = next_id;
            debug!("Heap index {} grew to page {}", self.root, next_id);
            next
        };

        entry.encode(target.write().append_unslotted(len)?);
        self.pages.write_page(&target)?;

        meta.entry_count += 1;
        meta.write(&mut root.write());
        self.pages.write_page(&root)
    }
}

impl Index for HeapIndex {
    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::Heap
    }

    fn root_page_id(&self) -> PageId {
        self.root
    }

    fn find(&self, key: &IndexKey) -> Result<Option<PageAddress>> {
        Ok(self.locate(key)?.map(|located| located.entry.address))
    }

    fn find_many(&self, key: &IndexKey) -> Result<Vec<PageAddress>> {
        let mut found = Vec::new();
        self.scan(|_, _, entry| {
            if let Some(entry) = entry.filter(|entry| entry.key == *key) {
                found.push(entry.address);
            }
            Ok(false)
        })?;
        Ok(found)
    }

    fn insert(&self, key: IndexKey, address: PageAddress) -> Result<()> {
        key.validate()?;
        let _guard = self.write_lock.lock();
        self.append(&HeapKey::new(key, address))
    }

    fn delete(&self, key: &IndexKey) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let Some(located) = self.locate(key)? else {
            return Ok(false);
        };

        located.page.write().data_area_mut()[located.offset] = TOMBSTONE;
        self.pages.write_page(&located.page)?;

        let root = self.page(self.root)?;
        let mut meta = IndexMeta::read(&root.read())?;
        meta.entry_count = meta.entry_count.saturating_sub(1);
        meta.write(&mut root.write());
        self.pages.write_page(&root)?;
        Ok(true)
    }

    fn get_all(&self) -> Result<Vec<(IndexKey, PageAddress)>> {
        let mut all = Vec::new();
        self.scan(|_, _, entry| {
            if let Some(entry) = entry {
                all.push((entry.key, entry.address));
            }
            Ok(false)
        })?;
        Ok(all)
    }
}
