//! Skip list index
//!
//! Ordered keys stored as nodes in Index page slots. The start node lives in
//! slot 0 of the root page and has `max_level` forward pointers; every other
//! node draws its level once, from a geometric distribution, when inserted.
//!
//! ```text
//! level 2  start ─────────────────────► 17 ──────────────► ∅
//! level 1  start ───────► 5 ──────────► 17 ──────────────► ∅
//! level 0  start ─► 3 ──► 5 ──► 7 ──► 9 ──► 17 ──► 27 ───► ∅
//! ```

mod node;

pub use node::{SkipListNode, START_TYPE_CODE};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{CairnError, Result};
use crate::page::{IndexPage, PageAddress, PageId, TypedPage, PAGE_ADDRESS_SIZE};
use crate::pager::PageService;

use super::{Index, IndexKey, IndexMeta, IndexStrategy};

/// Node read during a traversal, with where it is stored
#[derive(Debug, Clone)]
struct Visited {
    at: PageAddress,
    node: SkipListNode,
}

/// Pages modified by one operation, written once at the end
type Touched = BTreeMap<PageId, IndexPage>;

pub struct SkipListIndex {
    pages: Arc<PageService>,
    root: PageId,
    max_level: u8,
    probability: f64,
    rng: Mutex<StdRng>,
    write_lock: Mutex<()>,
}

impl SkipListIndex {
    /// Create an empty skip list rooted at a new Index page
    pub fn create(
        pages: Arc<PageService>,
        max_level: u8,
        probability: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        let root = pages.create_new_page::<IndexPage>()?;
        let root_id = root.id();
        {
            let mut guard = root.write();
            IndexMeta::start(IndexStrategy::SkipList, root_id, max_level).write(&mut guard);

            let start = SkipListNode::start(max_level);
            let (span, slot) = guard.insert(start.encoded_len())?;
            start.encode(span);
            if slot != 0 {
                return Err(CairnError::InvalidPage {
                    page_id: root_id,
                    reason: format!("start node landed in slot {}", slot),
                });
            }
        }
        pages.write_page(&root)?;
        debug!("Created skip list index at page {} (max level {})", root_id, max_level);

        Ok(Self::with_parts(pages, root_id, max_level, probability, seed))
    }

    /// Open the skip list whose start page is `root`
    pub fn open(
        pages: Arc<PageService>,
        root: PageId,
        probability: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        let page = pages
            .get_page::<IndexPage>(root)?
            .ok_or(CairnError::PageNotFound { page_id: root })?;
        let meta = IndexMeta::read(&page.read())?;
        if !meta.is_start || meta.strategy != IndexStrategy::SkipList {
            return Err(CairnError::InvalidPage {
                page_id: root,
                reason: "not the start page of a skip list index".to_string(),
            });
        }
        Ok(Self::with_parts(pages, root, meta.max_level, probability, seed))
    }

    fn with_parts(
        pages: Arc<PageService>,
        root: PageId,
        max_level: u8,
        probability: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ root as u64),
            None => StdRng::from_entropy(),
        };
        Self {
            pages,
            root,
            max_level,
            probability,
            rng: Mutex::new(rng),
            write_lock: Mutex::new(()),
        }
    }

    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    /// Live entries recorded in the start page
    pub fn len(&self) -> Result<u64> {
        Ok(IndexMeta::read(&self.page(self.root)?.read())?.entry_count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Level of the node holding `key`, if present
    pub fn node_level(&self, key: &IndexKey) -> Result<Option<usize>> {
        Ok(self.first_match(key)?.map(|found| found.node.level()))
    }

    // =========================================================================
    // Node Access
    // =========================================================================

    fn start_address(&self) -> PageAddress {
        PageAddress::new(self.root, 0)
    }

    fn page(&self, page_id: PageId) -> Result<IndexPage> {
        self.pages
            .get_page::<IndexPage>(page_id)?
            .ok_or(CairnError::PageNotFound { page_id })
    }

    fn read_node(&self, at: PageAddress) -> Result<Visited> {
        let page = self.page(at.page_id)?;
        let node = SkipListNode::decode(page.read().read(at.slot_id)?)?;
        Ok(Visited { at, node })
    }

    /// Rewrite `forward[level]` of the node stored at `owner.at`
    fn set_forward(
        &self,
        owner: &Visited,
        level: usize,
        target: PageAddress,
        touched: &mut Touched,
    ) -> Result<()> {
        let page = self.page(owner.at.page_id)?;
        let offset = owner.node.forward_offset(level);
        {
            let mut guard = page.write();
            let slot = guard.slot_mut(owner.at.slot_id)?;
            target.encode(&mut slot[offset..offset + PAGE_ADDRESS_SIZE]);
        }
        touched.entry(page.id()).or_insert(page);
        Ok(())
    }

    /// Place `node` on the tail page, starting a new page when it does not fit
    fn store_node(&self, node: &SkipListNode, touched: &mut Touched) -> Result<PageAddress> {
        let root = self.page(self.root)?;
        let mut meta = IndexMeta::read(&root.read())?;
        let tail = self.page(meta.tail_page_id)?;
        let len = node.encoded_len();

        let target = if tail.read().is_insert_possible(len) {
            tail
        } else {
            let next = self.pages.create_new_page::<IndexPage>()?;
            {
                let mut guard = next.write();
                IndexMeta::continuation(IndexStrategy::SkipList).write(&mut guard);
                guard.set_prev_page_id(tail.id());
            }
            tail.write().set_next_page_id(next.id());
            meta.tail_page_id = next.id();
            meta.write(&mut root.write());
            debug!("Skip list {} grew to page {}", self.root, next.id());
            touched.insert(tail.id(), tail);
            touched.insert(self.root, root);
            next
        };

        let slot = {
            let mut guard = target.write();
            let (span, slot) = guard.insert(len)?;
            node.encode(span);
            slot
        };
        let at = PageAddress::new(target.id(), slot);
        touched.entry(target.id()).or_insert(target);
        Ok(at)
    }

    fn adjust_count(&self, added: bool, touched: &mut Touched) -> Result<()> {
        let root = self.page(self.root)?;
        {
            let mut guard = root.write();
            let mut meta = IndexMeta::read(&guard)?;
            meta.entry_count = if added {
                meta.entry_count + 1
            } else {
                meta.entry_count.saturating_sub(1)
            };
            meta.write(&mut guard);
        }
        touched.entry(self.root).or_insert(root);
        Ok(())
    }

    fn write_touched(&self, touched: Touched) -> Result<()> {
        for page in touched.values() {
            self.pages.write_page(page)?;
        }
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Last node with a key below `key` on every level, level 0 first
    fn predecessors(&self, key: &IndexKey) -> Result<Vec<Visited>> {
        let mut current = self.read_node(self.start_address())?;
        let levels = current.node.level();
        let mut update = Vec::with_capacity(levels);

        for level in (0..levels).rev() {
            loop {
                let next = current.node.forward[level];
                if next.is_empty() {
                    break;
                }
                let candidate = self.read_node(next)?;
                if !matches!(&candidate.node.key, Some(candidate_key) if candidate_key < key) {
                    break;
                }
                current = candidate;
            }
            update.push(current.clone());
        }
        update.reverse();
        Ok(update)
    }

    /// First node holding `key`
    fn first_match(&self, key: &IndexKey) -> Result<Option<Visited>> {
        let predecessors = self.predecessors(key)?;
        let Some(before) = predecessors.first() else {
            return Ok(None);
        };
        let next = before.node.forward[0];
        if next.is_empty() {
            return Ok(None);
        }
        let candidate = self.read_node(next)?;
        if candidate.node.key.as_ref() == Some(key) {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }

    /// Draw a level: keep flipping while `random() < p`, capped at `max_level`
    fn random_level(&self) -> usize {
        let mut rng = self.rng.lock();
        let mut level = 1;
        while level < self.max_level as usize && rng.gen::<f64>() < self.probability {
            level += 1;
        }
        level
    }
}

impl Index for SkipListIndex {
    fn strategy(&self) -> IndexStrategy {
        IndexStrategy::SkipList
    }

    fn root_page_id(&self) -> PageId {
        self.root
    }

    fn find(&self, key: &IndexKey) -> Result<Option<PageAddress>> {
        Ok(self.first_match(key)?.map(|found| found.node.address))
    }

    fn find_many(&self, key: &IndexKey) -> Result<Vec<PageAddress>> {
        let mut found = Vec::new();
        let mut current = self.first_match(key)?;
        while let Some(visited) = current {
            if visited.node.key.as_ref() != Some(key) {
                break;
            }
            found.push(visited.node.address);
            let next = visited.node.forward[0];
            current = if next.is_empty() {
                None
            } else {
                Some(self.read_node(next)?)
            };
        }
        Ok(found)
    }

    fn insert(&self, key: IndexKey, address: PageAddress) -> Result<()> {
        key.validate()?;
        let _guard = self.write_lock.lock();

        let predecessors = self.predecessors(&key)?;
        let level = self.random_level().min(predecessors.len());
        let forward = predecessors[..level]
            .iter()
            .enumerate()
            .map(|(i, before)| before.node.forward[i])
            .collect();
        let node = SkipListNode::new(key, address, forward);

        let mut touched = Touched::new();
        let at = self.store_node(&node, &mut touched)?;
        for (i, before) in predecessors[..level].iter().enumerate() {
            self.set_forward(before, i, at, &mut touched)?;
        }
        self.adjust_count(true, &mut touched)?;
        self.write_touched(touched)
    }

    fn delete(&self, key: &IndexKey) -> Result<bool> {
        let _guard = self.write_lock.lock();

        let predecessors = self.predecessors(key)?;
        let Some(before) = predecessors.first() else {
            return Ok(false);
        };
        let target_at = before.node.forward[0];
        if target_at.is_empty() {
            return Ok(false);
        }
        let target = self.read_node(target_at)?;
        if target.node.key.as_ref() != Some(key) {
            return Ok(false);
        }

        let mut touched = Touched::new();
        for (i, before) in predecessors.iter().enumerate().take(target.node.level()) {
            if before.node.forward[i] == target_at {
                self.set_forward(before, i, target.node.forward[i], &mut touched)?;
            }
        }

        let page = self.page(target_at.page_id)?;
        page.write().delete(target_at.slot_id)?;
        touched.entry(page.id()).or_insert(page);

        self.adjust_count(false, &mut touched)?;
        self.write_touched(touched)?;
        Ok(true)
    }

    fn get_all(&self) -> Result<Vec<(IndexKey, PageAddress)>> {
        let mut all = Vec::new();
        let mut next = self.read_node(self.start_address())?.node.forward[0];
        while !next.is_empty() {
            let visited = self.read_node(next)?;
            if let Some(key) = visited.node.key {
                all.push((key, visited.node.address));
            }
            next = visited.node.forward[0];
        }
        Ok(all)
    }
}
