//! Error types for Cairn
//!
//! Provides a unified error type for all operations.

use std::fmt;

use thiserror::Error;

use crate::page::{PageId, PageKind};

/// Result type alias using CairnError
pub type Result<T> = std::result::Result<T, CairnError>;

/// Direction of a failed page transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Read,
    Write,
}

impl fmt::Display for IoDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoDirection::Read => write!(f, "read"),
            IoDirection::Write => write!(f, "write"),
        }
    }
}

/// Unified error type for Cairn operations
#[derive(Debug, Error)]
pub enum CairnError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {page_id} {direction} failed: {source}")]
    PageIo {
        page_id: PageId,
        direction: IoDirection,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    // -------------------------------------------------------------------------
    // Page Format Errors
    // -------------------------------------------------------------------------
    #[error("Page {page_id} has kind 0x{found:02x}, expected {expected:?}")]
    InvalidPageKind {
        page_id: PageId,
        expected: PageKind,
        found: u8,
    },

    #[error("Invalid page {page_id}: {reason}")]
    InvalidPage { page_id: PageId, reason: String },

    #[error("Page {page_id} not found")]
    PageNotFound { page_id: PageId },

    #[error("Slot {slot_id} on page {page_id} is empty")]
    SlotNotFound { page_id: PageId, slot_id: u8 },

    #[error("Page {page_id} checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        page_id: PageId,
        stored: u32,
        computed: u32,
    },

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Page {page_id} is full: requested {requested} bytes, {available} available")]
    PageFull {
        page_id: PageId,
        requested: usize,
        available: usize,
    },

    #[error("Buffer pool exhausted: all {capacity} buffers are rented")]
    PoolExhausted { capacity: usize },

    // -------------------------------------------------------------------------
    // Ownership Errors
    // -------------------------------------------------------------------------
    #[error("Page {page_id} is already claimed by owner {owner}")]
    TransactionConflict { page_id: PageId, owner: u64 },

    // -------------------------------------------------------------------------
    // Index Key Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported key type code: 0x{0:02x}")]
    UnsupportedKeyType(u8),

    #[error("Key too large: {size} bytes (max: {max})")]
    KeyTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Async Errors
    // -------------------------------------------------------------------------
    #[error("Background task failed: {0}")]
    Task(String),
}

impl CairnError {
    /// Conditions the caller is expected to retry against a different page
    /// or pool state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CairnError::PageFull { .. }
                | CairnError::PoolExhausted { .. }
                | CairnError::TransactionConflict { .. }
        )
    }
}

impl From<bincode::Error> for CairnError {
    fn from(err: bincode::Error) -> Self {
        CairnError::Serialization(err.to_string())
    }
}
