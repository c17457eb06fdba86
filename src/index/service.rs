//! Index Service
//!
//! Creates indexes and reopens them from their start page.

use std::sync::Arc;

use tracing::info;

use crate::error::{CairnError, Result};
use crate::page::{IndexPage, PageId, TypedPage};
use crate::pager::PageService;

use super::{HeapIndex, Index, IndexMeta, IndexStrategy, SkipListIndex};

pub struct IndexService {
    pages: Arc<PageService>,
}

impl IndexService {
    pub fn new(pages: Arc<PageService>) -> Self {
        Self { pages }
    }

    /// Create an empty index using `strategy`
    pub fn create_index(&self, strategy: IndexStrategy) -> Result<Box<dyn Index>> {
        let config = self.pages.config();
        let index: Box<dyn Index> = match strategy {
            IndexStrategy::Heap => Box::new(HeapIndex::create(Arc::clone(&self.pages))?),
            IndexStrategy::SkipList => Box::new(SkipListIndex::create(
                Arc::clone(&self.pages),
                config.skiplist_max_level,
                config.skiplist_probability,
                config.skiplist_seed,
            )?),
        };
        info!("Created {:?} index at page {}", strategy, index.root_page_id());
        Ok(index)
    }

    /// Reopen the index whose start page is `root`, picking the strategy it was created with
    pub fn load_index(&self, root: PageId) -> Result<Box<dyn Index>> {
        let page = self
            .pages
            .get_page::<IndexPage>(root)?
            .ok_or(CairnError::PageNotFound { page_id: root })?;
        let meta = IndexMeta::read(&page.read())?;
        if !meta.is_start {
            return Err(CairnError::InvalidPage {
                page_id: page.id(),
                reason: "index page is not a start page".to_string(),
            });
        }
        drop(page);

        let config = self.pages.config();
        let index: Box<dyn Index> = match meta.strategy {
            IndexStrategy::Heap => Box::new(HeapIndex::open(Arc::clone(&self.pages), root)?),
            IndexStrategy::SkipList => Box::new(SkipListIndex::open(
                Arc::clone(&self.pages),
                root,
                config.skiplist_probability,
                config.skiplist_seed,
            )?),
        };
        Ok(index)
    }
}
