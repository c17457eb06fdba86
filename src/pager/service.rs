//! Page Service
//!
//! The single owner of cached pages, the allocation maps and the file header.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::alloc::{
    aim_page_id_for, first_aim_page_id, gam_page_id, get_next_aim_page_id,
    is_allocation_information_page, AimEntry, AllocationInformationMap, GlobalAllocationMap,
    FIRST_GAM_PAGE_ID, PAGES_PER_GAM,
};
use crate::buffer::{BufferPool, PageBuffer};
use crate::config::Config;
use crate::disk::DiskService;
use crate::error::{CairnError, Result};
use crate::page::{is_blank, DataPage, FillFactor, Page, PageId, PageKind, PageRef, TypedPage};

use super::{FileHeader, PageSummary, PagerStats, HEADER_PAGE_ID};

/// Caches pages and brokers every allocation and write.
///
/// Callers must drop page guards before calling back into the service;
/// `write_page` takes the page's write lock itself.
pub struct PageService {
    config: Config,
    pool: Arc<dyn BufferPool>,
    disk: Arc<dyn DiskService>,

    /// Data, index, table and overflow pages
    cache: Mutex<LruCache<PageId, PageRef>>,

    /// One map per 65,024-page range, in id order
    gams: RwLock<Vec<Arc<GlobalAllocationMap>>>,

    /// Allocation information pages loaded so far
    aims: Mutex<HashMap<PageId, AllocationInformationMap>>,

    header: Mutex<FileHeader>,

    /// Data pages known to have room
    free_data_pages: Mutex<BTreeSet<PageId>>,

    /// Set once the AIMs have been scanned for free Data pages
    aims_probed: AtomicBool,

    /// page id -> owner of an in-flight write
    claims: Mutex<HashMap<PageId, u64>>,
    next_owner: AtomicU64,

    /// Serializes id acquisition with AIM materialization
    alloc_lock: Mutex<()>,
}

impl PageService {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the file behind `disk`, laying out a new one when it is empty
    pub fn open(
        config: Config,
        pool: Arc<dyn BufferPool>,
        disk: Arc<dyn DiskService>,
    ) -> Result<Self> {
        let existing = match disk.read_page(HEADER_PAGE_ID) {
            Ok(buffer) if !is_blank(&buffer) => Some(buffer),
            Ok(_) | Err(CairnError::PageNotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        let (header, gams) = match existing {
            Some(buffer) => Self::load_layout(&config, &*disk, buffer)?,
            None if config.create_if_missing => Self::create_layout(&*pool, &*disk)?,
            None => {
                return Err(CairnError::InvalidPage {
                    page_id: HEADER_PAGE_ID,
                    reason: "no database header and create_if_missing is off".to_string(),
                })
            }
        };
        info!(
            "Opened database: version {}, {} allocation map(s)",
            header.version(),
            gams.len()
        );

        Ok(Self {
            cache: Mutex::new(LruCache::unbounded()),
            gams: RwLock::new(gams),
            aims: Mutex::new(HashMap::new()),
            header: Mutex::new(header),
            free_data_pages: Mutex::new(BTreeSet::new()),
            aims_probed: AtomicBool::new(false),
            claims: Mutex::new(HashMap::new()),
            next_owner: AtomicU64::new(1),
            alloc_lock: Mutex::new(()),
            config,
            pool,
            disk,
        })
    }

    fn create_layout(
        pool: &dyn BufferPool,
        disk: &dyn DiskService,
    ) -> Result<(FileHeader, Vec<Arc<GlobalAllocationMap>>)> {
        let mut header = FileHeader::create(pool.rent()?);
        let gam = GlobalAllocationMap::create(pool.rent()?, FIRST_GAM_PAGE_ID);

        persist_raw(disk, header.page_mut())?;
        gam.with_page(|page| persist_raw(disk, page))?;
        disk.flush()?;

        info!("Created new database file");
        Ok((header, vec![Arc::new(gam)]))
    }

    fn load_layout(
        config: &Config,
        disk: &dyn DiskService,
        buffer: PageBuffer,
    ) -> Result<(FileHeader, Vec<Arc<GlobalAllocationMap>>)> {
        let header = FileHeader::load(buffer)?;
        if config.verify_checksums {
            header.page().verify_checksum()?;
        }

        let mut gams = Vec::with_capacity(header.gam_count() as usize);
        for index in 0..header.gam_count() {
            let gam = GlobalAllocationMap::load(disk.read_page(gam_page_id(index))?)?;
            if config.verify_checksums {
                gam.with_page(|page| page.verify_checksum())?;
            }
            gams.push(Arc::new(gam));
        }
        if gams.is_empty() {
            return Err(CairnError::Corruption(
                "file header lists no allocation maps".to_string(),
            ));
        }
        Ok((header, gams))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &Arc<dyn BufferPool> {
        &self.pool
    }

    pub fn disk(&self) -> &Arc<dyn DiskService> {
        &self.disk
    }

    /// Creation time stored in the file header, unix millis
    pub fn created_at(&self) -> u64 {
        self.header.lock().created_at()
    }

    pub fn format_version(&self) -> u16 {
        self.header.lock().version()
    }

    /// Allocation maps in id order
    pub fn gams(&self) -> Vec<Arc<GlobalAllocationMap>> {
        self.gams.read().clone()
    }

    // =========================================================================
    // Page Access
    // =========================================================================

    /// Fetch a page of kind `T`.
    ///
    /// Pages that were never written (or lie past the end of the file) read
    /// as `None`.
    pub fn get_page<T: TypedPage>(&self, page_id: PageId) -> Result<Option<T>> {
        if let Some(page) = self.cached(page_id) {
            let kind = page.read().kind();
            if kind != T::KIND {
                return Err(CairnError::InvalidPageKind {
                    page_id,
                    expected: T::KIND,
                    found: kind.as_byte(),
                });
            }
            return Ok(Some(T::from_ref(page)));
        }

        let Some(page) = self.read_from_disk(page_id, T::KIND)? else {
            return Ok(None);
        };
        let fill = page.fill_factor();
        let page = self.insert_cached(page_id, Arc::new(RwLock::new(page)));
        if T::KIND == PageKind::Data {
            self.note_data_fill(page_id, fill);
        }
        Ok(Some(T::from_ref(page)))
    }

    /// Allocate, register and cache an empty page of kind `T`
    pub fn create_new_page<T: TypedPage>(&self) -> Result<T> {
        let buffer = self.pool.rent()?;
        let page_id = self.allocate_page_id(T::KIND)?;
        let page = Page::new(buffer, page_id, T::KIND);
        let fill = page.fill_factor();

        let page = self.insert_cached(page_id, Arc::new(RwLock::new(page)));
        if T::KIND == PageKind::Data {
            self.note_data_fill(page_id, fill);
        }
        debug!("Created {:?} page {}", T::KIND, page_id);
        Ok(T::from_ref(page))
    }

    /// Persist `page` if it is dirty
    pub fn write_page<T: TypedPage>(&self, page: &T) -> Result<()> {
        self.write_page_ref(page.page_ref())
    }

    pub fn write_page_ref(&self, page: &PageRef) -> Result<()> {
        let (page_id, kind, fill) = {
            let mut page = page.write();
            if !page.is_dirty() {
                return Ok(());
            }
            let page_id = page.id();
            self.disk.write_page(page_id, page.seal())?;
            page.clear_dirty();
            (page_id, page.kind(), page.fill_factor())
        };
        self.record_fill(page_id, kind, fill)
    }

    /// A Data page with room that no other owner has claimed, creating one if needed
    pub fn get_data_page_with_free_space(&self) -> Result<DataPage> {
        let candidates: Vec<PageId> = self.free_data_pages.lock().iter().copied().collect();
        for page_id in candidates {
            if let Some(page) = self.usable_data_page(page_id)? {
                return Ok(page);
            }
        }

        if !self.aims_probed.swap(true, Ordering::AcqRel) {
            for page_id in self.probe_aims()? {
                if let Some(page) = self.usable_data_page(page_id)? {
                    return Ok(page);
                }
            }
        }

        self.create_new_page::<DataPage>()
    }

    fn usable_data_page(&self, page_id: PageId) -> Result<Option<DataPage>> {
        if self.is_claimed(page_id) {
            return Ok(None);
        }
        let Some(page) = self.get_page::<DataPage>(page_id)? else {
            self.free_data_pages.lock().remove(&page_id);
            return Ok(None);
        };
        let fill = page.read().fill_factor();
        if !self.accepts_fill(fill) {
            self.free_data_pages.lock().remove(&page_id);
            return Ok(None);
        }
        Ok(Some(page))
    }

    /// Data pages the AIMs list with room, for files reopened from disk
    fn probe_aims(&self) -> Result<Vec<PageId>> {
        let gams = self.gams();
        let mut aims = self.aims.lock();
        let mut found = Vec::new();

        for gam in gams {
            let end = gam.id() + PAGES_PER_GAM;
            let mut aim_id = first_aim_page_id(gam.id());
            while aim_id < end && gam.is_allocated(aim_id)? {
                let aim = self.ensure_aim(&mut aims, aim_id)?;
                found.extend(
                    aim.entries()?
                        .into_iter()
                        .filter(|entry| entry.kind == PageKind::Data)
                        .filter(|entry| self.accepts_fill(entry.fill))
                        .map(|entry| entry.page_id),
                );
                aim_id = get_next_aim_page_id(aim_id)?;
            }
        }
        debug!("AIM probe found {} candidate data pages", found.len());
        Ok(found)
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    /// New owner id for `claim_page`
    pub fn begin_owner(&self) -> u64 {
        self.next_owner.fetch_add(1, Ordering::Relaxed)
    }

    /// Mark `page_id` as in use by `owner`; re-claiming by the same owner is a no-op
    pub fn claim_page(&self, page_id: PageId, owner: u64) -> Result<()> {
        let mut claims = self.claims.lock();
        match claims.get(&page_id) {
            Some(&current) if current != owner => Err(CairnError::TransactionConflict {
                page_id,
                owner: current,
            }),
            _ => {
                claims.insert(page_id, owner);
                Ok(())
            }
        }
    }

    pub fn release_claims(&self, owner: u64) {
        self.claims.lock().retain(|_, claimed_by| *claimed_by != owner);
    }

    pub fn is_claimed(&self, page_id: PageId) -> bool {
        self.claims.lock().contains_key(&page_id)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write every dirty page and the allocation metadata, then empty the cache
    /// and drop the loaded AIMs.
    ///
    /// Writers should be quiescent; page handles held across a checkpoint
    /// detach from the cache.
    pub fn checkpoint(&self) -> Result<()> {
        let mut cache = self.cache.lock();

        let pages: Vec<PageRef> = cache.iter().map(|(_, page)| Arc::clone(page)).collect();
        let mut written = 0;
        for page in &pages {
            if page.read().is_dirty() {
                self.write_page_ref(page)?;
                written += 1;
            }
        }
        drop(pages);

        self.persist_metadata()?;
        self.disk.flush()?;
        cache.clear();

        info!("Checkpoint complete: {} dirty pages written", written);
        Ok(())
    }

    /// Persist the listed pages if cached and dirty; returns how many were written
    pub fn flush_pages(&self, page_ids: &[PageId]) -> Result<usize> {
        let mut written = 0;
        for &page_id in page_ids {
            if let Some(page) = self.cached(page_id) {
                if page.read().is_dirty() {
                    self.write_page_ref(&page)?;
                    written += 1;
                }
            }
        }
        self.disk.flush()?;
        Ok(written)
    }

    fn persist_metadata(&self) -> Result<()> {
        {
            let mut aims = self.aims.lock();
            for aim in aims.values_mut() {
                persist_raw(&*self.disk, aim.page_mut())?;
            }
            aims.clear();
        }

        let gams = self.gams.read();
        for gam in gams.iter() {
            gam.with_page(|page| persist_raw(&*self.disk, page))?;
        }

        let mut header = self.header.lock();
        header.set_gam_count(gams.len() as u32);
        persist_raw(&*self.disk, header.page_mut())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Header snapshot of any page, including the header, GAM and AIM pages
    pub fn page_summary(&self, page_id: PageId) -> Result<Option<PageSummary>> {
        if page_id == HEADER_PAGE_ID {
            return Ok(Some(PageSummary::of(self.header.lock().page())));
        }
        if let Some(gam) = self.gams.read().iter().find(|gam| gam.id() == page_id) {
            return Ok(Some(gam.with_page(|page| PageSummary::of(page))));
        }
        if let Some(aim) = self.aims.lock().get(&page_id) {
            return Ok(Some(PageSummary::of(aim.page())));
        }
        if let Some(page) = self.cached(page_id) {
            return Ok(Some(PageSummary::of(&page.read())));
        }

        let buffer = match self.disk.read_page(page_id) {
            Ok(buffer) => buffer,
            Err(CairnError::PageNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if is_blank(&buffer) {
            return Ok(None);
        }
        Ok(Some(PageSummary::of(&Page::load_any(buffer)?)))
    }

    /// AIM entry recorded for `page_id`
    pub fn aim_entry(&self, page_id: PageId) -> Result<Option<AimEntry>> {
        let Some(aim_id) = aim_page_id_for(page_id) else {
            return Ok(None);
        };
        let mut aims = self.aims.lock();
        self.ensure_aim(&mut aims, aim_id)?.get_entry(page_id)
    }

    pub fn stats(&self) -> Result<PagerStats> {
        let (cached_pages, dirty_pages) = {
            let cache = self.cache.lock();
            let dirty = cache
                .iter()
                .filter(|(_, page)| page.try_read().map(|p| p.is_dirty()).unwrap_or(true))
                .count();
            (cache.len(), dirty)
        };

        Ok(PagerStats {
            cached_pages,
            dirty_pages,
            gam_count: self.gams.read().len(),
            loaded_aims: self.aims.lock().len(),
            free_data_pages: self.free_data_pages.lock().len(),
            claimed_pages: self.claims.lock().len(),
            disk_pages: self.disk.page_count()?,
            pool: self.pool.stats(),
        })
    }

    // =========================================================================
    // Internal: Allocation
    // =========================================================================

    fn allocate_page_id(&self, kind: PageKind) -> Result<PageId> {
        let _guard = self.alloc_lock.lock();
        loop {
            let gam = self.current_gam()?;
            let page_id = match gam.acquire_page_id() {
                Ok(page_id) => page_id,
                Err(CairnError::InvalidPage { .. }) if gam.is_full() => {
                    self.grow_gam(&gam)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut aims = self.aims.lock();
            if is_allocation_information_page(page_id) {
                self.make_room_for_aim(&mut aims)?;
                let aim = AllocationInformationMap::create(self.pool.rent()?, page_id)?;
                aims.insert(page_id, aim);
                debug!("Materialized allocation information page {}", page_id);
                continue;
            }

            let aim_id = aim_page_id_for(page_id).ok_or_else(|| CairnError::InvalidPage {
                page_id,
                reason: "allocated id is not described by any AIM".to_string(),
            })?;
            self.ensure_aim(&mut aims, aim_id)?
                .add_entry(page_id, kind, FillFactor::Empty)?;
            return Ok(page_id);
        }
    }

    fn current_gam(&self) -> Result<Arc<GlobalAllocationMap>> {
        self.gams
            .read()
            .last()
            .cloned()
            .ok_or_else(|| CairnError::Corruption("no allocation map loaded".to_string()))
    }

    fn grow_gam(&self, full: &GlobalAllocationMap) -> Result<()> {
        let next_id = full.id() + PAGES_PER_GAM;
        let gam = GlobalAllocationMap::create(self.pool.rent()?, next_id);

        let mut gams = self.gams.write();
        gams.push(Arc::new(gam));
        self.header.lock().set_gam_count(gams.len() as u32);
        info!("Allocation map {} is full, started map {}", full.id(), next_id);
        Ok(())
    }

    /// Loaded AIM `aim_id`, reading it from disk or creating it when absent
    fn ensure_aim<'a>(
        &self,
        aims: &'a mut HashMap<PageId, AllocationInformationMap>,
        aim_id: PageId,
    ) -> Result<&'a mut AllocationInformationMap> {
        if !aims.contains_key(&aim_id) {
            self.make_room_for_aim(aims)?;
            let aim = match self.disk.read_page(aim_id) {
                Ok(buffer) if !is_blank(&buffer) => {
                    let aim = AllocationInformationMap::load(buffer)?;
                    if self.config.verify_checksums {
                        aim.page().verify_checksum()?;
                    }
                    aim
                }
                Ok(_) | Err(CairnError::PageNotFound { .. }) => {
                    AllocationInformationMap::create(self.pool.rent()?, aim_id)?
                }
                Err(e) => return Err(e),
            };
            aims.insert(aim_id, aim);
        }
        aims.get_mut(&aim_id)
            .ok_or(CairnError::PageNotFound { page_id: aim_id })
    }

    /// Write back and drop loaded AIMs until one more fits under `max_loaded_aims`
    fn make_room_for_aim(
        &self,
        aims: &mut HashMap<PageId, AllocationInformationMap>,
    ) -> Result<()> {
        while aims.len() >= self.config.max_loaded_aims {
            let Some((&aim_id, aim)) = aims.iter_mut().next() else {
                break;
            };
            persist_raw(&*self.disk, aim.page_mut())?;
            aims.remove(&aim_id);
            debug!("Unloaded allocation information page {}", aim_id);
        }
        Ok(())
    }

    fn record_fill(&self, page_id: PageId, kind: PageKind, fill: FillFactor) -> Result<()> {
        if let Some(aim_id) = aim_page_id_for(page_id) {
            let mut aims = self.aims.lock();
            let aim = self.ensure_aim(&mut aims, aim_id)?;
            match aim.get_entry(page_id)? {
                Some(_) => aim.update_entry(page_id, fill)?,
                None => aim.add_entry(page_id, kind, fill)?,
            }
        }
        if kind == PageKind::Data {
            self.note_data_fill(page_id, fill);
        }
        Ok(())
    }

    fn accepts_fill(&self, fill: FillFactor) -> bool {
        fill != FillFactor::Full && fill <= self.config.max_data_fill
    }

    fn note_data_fill(&self, page_id: PageId, fill: FillFactor) {
        let mut free = self.free_data_pages.lock();
        if self.accepts_fill(fill) {
            free.insert(page_id);
        } else {
            free.remove(&page_id);
        }
    }

    // =========================================================================
    // Internal: Cache
    // =========================================================================

    fn cached(&self, page_id: PageId) -> Option<PageRef> {
        self.cache.lock().get(&page_id).cloned()
    }

    fn read_from_disk(&self, page_id: PageId, kind: PageKind) -> Result<Option<Page>> {
        let buffer = match self.disk.read_page(page_id) {
            Ok(buffer) => buffer,
            Err(CairnError::PageNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if is_blank(&buffer) {
            return Ok(None);
        }

        let page = Page::load(buffer, kind)?;
        if self.config.verify_checksums {
            page.verify_checksum()?;
        }
        debug!("Loaded {:?} page {} from disk", kind, page_id);
        Ok(Some(page))
    }

    /// Cache `page`, or return the copy another caller cached first
    fn insert_cached(&self, page_id: PageId, page: PageRef) -> PageRef {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&page_id) {
            return Arc::clone(existing);
        }
        cache.put(page_id, Arc::clone(&page));
        self.evict(&mut cache);
        page
    }

    /// Drop least recently used pages nobody else holds, clean ones first.
    ///
    /// A dirty page leaves the cache only after its write succeeded; a failed
    /// write keeps it cached and dirty for a later eviction or checkpoint.
    fn evict(&self, cache: &mut LruCache<PageId, PageRef>) {
        let excess = cache.len().saturating_sub(self.config.max_page_cache);
        if excess == 0 {
            return;
        }

        let mut clean = Vec::new();
        let mut dirty = Vec::new();
        for (page_id, page) in cache.iter().rev() {
            if Arc::strong_count(page) > 1 {
                continue;
            }
            match page.try_read() {
                Some(guard) if guard.is_dirty() => dirty.push(*page_id),
                Some(_) => clean.push(*page_id),
                None => {}
            }
        }

        let mut evicted = 0;
        for page_id in clean.into_iter().chain(dirty) {
            if evicted == excess {
                break;
            }
            let Some(page) = cache.peek(&page_id).cloned() else {
                continue;
            };
            if let Err(e) = self.write_page_ref(&page) {
                warn!("Keeping page {} cached, eviction write failed: {}", page_id, e);
                continue;
            }
            drop(page);
            cache.pop(&page_id);
            evicted += 1;
        }

        if evicted < excess {
            warn!(
                "Page cache over capacity: {} pages cached, limit {}",
                cache.len(),
                self.config.max_page_cache
            );
        }
    }
}

/// Seal and write a metadata page owned directly by the service
fn persist_raw(disk: &dyn DiskService, page: &mut Page) -> Result<()> {
    if !page.is_dirty() {
        return Ok(());
    }
    let page_id = page.id();
    disk.write_page(page_id, page.seal())?;
    page.clear_dirty();
    Ok(())
}
