//! Index Module
//!
//! Maps typed keys to record addresses.
//!
//! ## Strategies
//! ```text
//! ┌──────────┬───────────────────────────────────┬──────────────────────┐
//! │ Heap     │ append-only entries, page chain   │ find: linear scan    │
//! │ SkipList │ ordered nodes with forward links  │ find: O(log n) walk  │
//! └──────────┴───────────────────────────────────┴──────────────────────┘
//! ```
//! Both strategies keep their metadata in the kind-specific header of the
//! start page, so `IndexService::load_index` needs only the root page id.

mod heap;
mod key;
mod meta;
mod service;
mod skiplist;

pub use heap::{HeapIndex, HeapKey, TOMBSTONE};
pub use key::{IndexKey, MAX_KEY_SIZE};
pub use meta::{IndexMeta, IndexStrategy};
pub use service::IndexService;
pub use skiplist::{SkipListIndex, SkipListNode, START_TYPE_CODE};

use crate::error::Result;
use crate::page::{PageAddress, PageId};

/// Common contract of every index strategy
pub trait Index: Send + Sync {
    fn strategy(&self) -> IndexStrategy;

    /// Start page; pass it to `IndexService::load_index` to reopen the index
    fn root_page_id(&self) -> PageId;

    /// Address stored with the first entry equal to `key`
    fn find(&self, key: &IndexKey) -> Result<Option<PageAddress>>;

    /// Addresses of every entry equal to `key`
    fn find_many(&self, key: &IndexKey) -> Result<Vec<PageAddress>>;

    fn insert(&self, key: IndexKey, address: PageAddress) -> Result<()>;

    /// Remove the first entry equal to `key`; `false` when none exists
    fn delete(&self, key: &IndexKey) -> Result<bool>;

    /// Every live entry (key order for skip lists, insertion order for heaps)
    fn get_all(&self) -> Result<Vec<(IndexKey, PageAddress)>>;
}
