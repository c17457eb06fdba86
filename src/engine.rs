//! Engine Module
//!
//! Wires the storage components together over one database file.
//!
//! ## Responsibilities
//! - Build the buffer pool, disk backend and page service from a `Config`
//! - Expose the data and index services that share them
//! - Checkpoint on request and on close

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::buffer::{self, BufferPool, PoolStats};
use crate::config::Config;
use crate::data::{CompressionService, DataService, IdentityCompression};
use crate::disk::{self, AsyncDisk};
use crate::error::Result;
use crate::index::IndexService;
use crate::pager::{PageService, PagerStats};

/// The storage core
///
/// ## Sharing Model
///
/// ```text
///            ┌──────────────┐
///            │  BufferPool  │  one instance, threaded through constructors
///            └──────┬───────┘
///        ┌──────────┴──────────┐
///        ▼                     ▼
/// ┌─────────────┐      ┌──────────────┐
/// │ DiskService │ ◄─── │ PageService  │ ◄─── DataService, IndexService
/// └─────────────┘      └──────────────┘
/// ```
pub struct Engine {
    config: Config,
    pool: Arc<dyn BufferPool>,
    pages: Arc<PageService>,
    data: DataService,
    indexes: IndexService,
}

/// Engine-wide counters
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub pager: PagerStats,
    pub pool: PoolStats,
}

impl Engine {
    /// Open or create the database described by `config`
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_compression(config, Arc::new(IdentityCompression))
    }

    /// Open with a custom payload compression
    pub fn open_with_compression(
        config: Config,
        compression: Arc<dyn CompressionService>,
    ) -> Result<Self> {
        // Step 1: Reject inconsistent settings before touching the file
        config.validate()?;

        // Step 2: One pool shared by the disk and the page cache
        let pool = buffer::pool_for(&config);

        // Step 3: Disk backend, then the page service on top of it
        let disk = disk::open_disk(&config, Arc::clone(&pool))?;
        let pages = Arc::new(PageService::open(config.clone(), Arc::clone(&pool), disk)?);

        // Step 4: Record and index services share the page service
        let data = DataService::new(Arc::clone(&pages), compression);
        let indexes = IndexService::new(Arc::clone(&pages));

        info!("Engine ready at {}", config.path.display());
        Ok(Self {
            config,
            pool,
            pages,
            data,
            indexes,
        })
    }

    /// Open a file-backed database at `path` with default settings
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().path(path).build())
    }

    /// Persist every dirty page and the allocation metadata
    pub fn checkpoint(&self) -> Result<()> {
        self.pages.checkpoint()
    }

    /// Checkpoint and release the file
    pub fn close(self) -> Result<()> {
        self.pages.checkpoint()?;
        info!("Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn pages(&self) -> &Arc<PageService> {
        &self.pages
    }

    pub fn data(&self) -> &DataService {
        &self.data
    }

    pub fn indexes(&self) -> &IndexService {
        &self.indexes
    }

    pub fn pool(&self) -> &Arc<dyn BufferPool> {
        &self.pool
    }

    /// Async facade over the engine's disk backend
    pub fn async_disk(&self) -> AsyncDisk {
        AsyncDisk::new(Arc::clone(self.pages.disk()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            pager: self.pages.stats()?,
            pool: self.pool.stats(),
        })
    }
}
