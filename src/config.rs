//! Configuration for Cairn
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CairnError, Result};
use crate::page::FillFactor;

/// Main configuration for a Cairn database file
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single database file.
    /// Layout:
    ///   page 0        file header
    ///   page 1        first global allocation map
    ///   page 2, ...   allocation information maps interleaved with data
    pub path: PathBuf,

    /// How pages reach the backing file
    pub disk_backend: DiskBackend,

    /// Bytes per memory-mapped chunk, in pages (MemoryMapped backend only)
    pub mmap_chunk_pages: u32,

    /// Verify page checksums when pages are read back
    pub verify_checksums: bool,

    /// Lay out a new database when the file has no header; otherwise fail
    pub create_if_missing: bool,

    // -------------------------------------------------------------------------
    // Memory Configuration
    // -------------------------------------------------------------------------
    /// Buffer pool flavour
    pub pool_kind: PoolKind,

    /// Number of pages the page cache keeps before evicting
    pub max_page_cache: usize,

    /// Allocation information pages kept loaded; the rest are written back and dropped
    pub max_loaded_aims: usize,

    /// Extra arena slots beyond the cache and loaded AIMs (file header, GAMs, in-flight reads)
    pub pool_slack: usize,

    // -------------------------------------------------------------------------
    // Data Page Configuration
    // -------------------------------------------------------------------------
    /// Data pages above this fill factor are not offered for new blocks
    pub max_data_fill: FillFactor,

    // -------------------------------------------------------------------------
    // Skip List Configuration
    // -------------------------------------------------------------------------
    /// Level of the start node (maximum node level)
    pub skiplist_max_level: u8,

    /// Probability of promoting a node one more level
    pub skiplist_probability: f64,

    /// Fixed RNG seed for reproducible level assignment
    pub skiplist_seed: Option<u64>,
}

/// Backing store used by the disk service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskBackend {
    /// Seek + read/write through a single locked file handle
    Stream,

    /// Positioned reads/writes, no shared cursor
    RandomAccess,

    /// Memory-mapped file, remapped in fixed-size chunks as it grows
    MemoryMapped,

    /// Volatile in-memory pages (tests, scratch databases)
    Memory,
}

/// Buffer pool implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Growable pool backed by the global allocator
    Managed,

    /// Fixed arena pre-allocated at startup
    Arena,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./cairn.db"),
            disk_backend: DiskBackend::RandomAccess,
            mmap_chunk_pages: 1024, // 8 MB per mapping step
            verify_checksums: true,
            create_if_missing: true,
            pool_kind: PoolKind::Managed,
            max_page_cache: 4096, // 32 MB of cached pages
            max_loaded_aims: 8,
            pool_slack: 64,
            max_data_fill: FillFactor::High,
            skiplist_max_level: 16,
            skiplist_probability: 0.5,
            skiplist_seed: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the settings for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_page_cache == 0 {
            return Err(CairnError::Config(
                "max_page_cache must be greater than zero".to_string(),
            ));
        }
        if self.max_loaded_aims == 0 {
            return Err(CairnError::Config(
                "max_loaded_aims must be greater than zero".to_string(),
            ));
        }
        if self.mmap_chunk_pages == 0 {
            return Err(CairnError::Config(
                "mmap_chunk_pages must be greater than zero".to_string(),
            ));
        }
        if self.skiplist_max_level == 0 || self.skiplist_max_level > 32 {
            return Err(CairnError::Config(format!(
                "skiplist_max_level must be within 1..=32, got {}",
                self.skiplist_max_level
            )));
        }
        if !(self.skiplist_probability > 0.0 && self.skiplist_probability < 1.0) {
            return Err(CairnError::Config(format!(
                "skiplist_probability must be within (0, 1), got {}",
                self.skiplist_probability
            )));
        }
        Ok(())
    }

    /// Total number of buffers an arena pool pre-allocates
    pub fn arena_slots(&self) -> usize {
        self.max_page_cache + self.max_loaded_aims + self.pool_slack
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the disk backend
    pub fn disk_backend(mut self, backend: DiskBackend) -> Self {
        self.config.disk_backend = backend;
        self
    }

    /// Set the memory-mapped chunk size (in pages)
    pub fn mmap_chunk_pages(mut self, pages: u32) -> Self {
        self.config.mmap_chunk_pages = pages;
        self
    }

    /// Enable or disable checksum verification on read
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Allow or refuse laying out a new database in an empty file
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the buffer pool flavour
    pub fn pool_kind(mut self, kind: PoolKind) -> Self {
        self.config.pool_kind = kind;
        self
    }

    /// Set the page cache capacity (in pages)
    pub fn max_page_cache(mut self, pages: usize) -> Self {
        self.config.max_page_cache = pages;
        self
    }

    /// Set how many allocation information pages stay loaded
    pub fn max_loaded_aims(mut self, aims: usize) -> Self {
        self.config.max_loaded_aims = aims;
        self
    }

    /// Set the number of extra arena slots
    pub fn pool_slack(mut self, slots: usize) -> Self {
        self.config.pool_slack = slots;
        self
    }

    /// Set the highest fill factor a data page may have to receive new blocks
    pub fn max_data_fill(mut self, fill: FillFactor) -> Self {
        self.config.max_data_fill = fill;
        self
    }

    /// Set the skip-list maximum level
    pub fn skiplist_max_level(mut self, level: u8) -> Self {
        self.config.skiplist_max_level = level;
        self
    }

    /// Set the skip-list promotion probability
    pub fn skiplist_probability(mut self, p: f64) -> Self {
        self.config.skiplist_probability = p;
        self
    }

    /// Use a fixed seed for skip-list level assignment
    pub fn skiplist_seed(mut self, seed: u64) -> Self {
        self.config.skiplist_seed = Some(seed);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
