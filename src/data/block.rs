//! Block header
//!
//! ```text
//! ┌────────────────────────┬───────────────┬──────────┐
//! │ next block address (8) │ following (1) │ rsvd (1) │
//! └────────────────────────┴───────────────┴──────────┘
//! ```
//! `following` is set on every block except the first of a record.

use crate::page::{PageAddress, PAGE_ADDRESS_SIZE};

pub const BLOCK_HEADER_SIZE: usize = PAGE_ADDRESS_SIZE + 2;

const FOLLOWING_OFFSET: usize = PAGE_ADDRESS_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub next_block: PageAddress,
    pub is_following_block: bool,
}

impl BlockHeader {
    pub fn new(is_following_block: bool) -> Self {
        Self {
            next_block: PageAddress::EMPTY,
            is_following_block,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        self.next_block.encode(&mut buf[..PAGE_ADDRESS_SIZE]);
        buf[FOLLOWING_OFFSET] = self.is_following_block as u8;
        buf[FOLLOWING_OFFSET + 1] = 0;
    }

    pub fn decode(buf: &[u8]) -> Self {
        Self {
            next_block: PageAddress::decode(&buf[..PAGE_ADDRESS_SIZE]),
            is_following_block: buf[FOLLOWING_OFFSET] != 0,
        }
    }

    /// Point an encoded header at `next` without touching its flags
    pub fn link(buf: &mut [u8], next: PageAddress) {
        next.encode(&mut buf[..PAGE_ADDRESS_SIZE]);
    }
}
