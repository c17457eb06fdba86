//! Page addresses
//!
//! `(page_id, slot_id)` pointer used for records and index nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{PageId, NO_PAGE};

/// Wire width: page id (4) + slot id (1) + padding (3)
pub const PAGE_ADDRESS_SIZE: usize = 8;

/// Location of a record or index node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageAddress {
    pub page_id: PageId,
    pub slot_id: u8,
}

impl PageAddress {
    /// "No target"
    pub const EMPTY: PageAddress = PageAddress {
        page_id: NO_PAGE,
        slot_id: 0,
    };

    pub fn new(page_id: PageId, slot_id: u8) -> Self {
        Self { page_id, slot_id }
    }

    pub fn is_empty(&self) -> bool {
        self.page_id == NO_PAGE
    }

    /// Write the 8-byte wire form into the start of `buf`
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4] = self.slot_id;
        buf[5..PAGE_ADDRESS_SIZE].fill(0);
    }

    /// Read the 8-byte wire form from the start of `buf`
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            page_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            slot_id: buf[4],
        }
    }

    pub fn to_bytes(&self) -> [u8; PAGE_ADDRESS_SIZE] {
        let mut bytes = [0u8; PAGE_ADDRESS_SIZE];
        self.encode(&mut bytes);
        bytes
    }
}

impl Default for PageAddress {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for PageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "(empty)")
        } else {
            write!(f, "({}:{})", self.page_id, self.slot_id)
        }
    }
}
