//! # Cairn
//!
//! The storage core of an embedded, single-file object database:
//! - Fixed-size slotted pages with checksummed headers
//! - Two-tier page allocation (GAM bitmap + AIM fill tracking)
//! - Records chained across pages in linked blocks
//! - Heap and skip-list indexes over typed keys
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │       DataService        │   │       IndexService       │
//! │  (block-chained records) │   │   (Heap / SkipList)      │
//! └────────────┬─────────────┘   └────────────┬─────────────┘
//!              └──────────────┬───────────────┘
//!                             ▼
//!              ┌──────────────────────────────┐
//!              │         PageService          │
//!              │ LRU cache · GAM/AIM · claims │
//!              └──────┬────────────────┬──────┘
//!                     ▼                ▼
//!              ┌─────────────┐  ┌─────────────┐
//!              │ DiskService │  │ BufferPool  │
//!              │ (4 backends)│  │ (managed /  │
//!              └─────────────┘  │   arena)    │
//!                               └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod page;
pub mod alloc;
pub mod disk;
pub mod pager;
pub mod data;
pub mod index;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CairnError, Result};
pub use config::{Config, DiskBackend, PoolKind};
pub use engine::Engine;
pub use page::{PageAddress, PageId, PageKind};
pub use index::{Index, IndexKey, IndexStrategy};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Cairn
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
