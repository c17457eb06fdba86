//! Data Module
//!
//! Stores serialized records as chains of blocks across Data pages.
//!
//! ## Record Layout
//! ```text
//!  page 3, slot 0             page 9, slot 2             page 12, slot 0
//! ┌────────┬──────────┐      ┌────────┬──────────┐      ┌────────┬────────┐
//! │ header │ bytes    │ ───► │ header │ bytes    │ ───► │ header │ bytes  │
//! │ next=9:2          │      │ next=12:0, follow │      │ EMPTY, follow   │
//! └────────┴──────────┘      └────────┴──────────┘      └────────┴────────┘
//! ```
//! A record is addressed by its first block.

mod block;
mod compression;
mod service;

pub use block::{BlockHeader, BLOCK_HEADER_SIZE};
pub use compression::{CompressionService, IdentityCompression};
pub use service::{DataService, WriteMode};
