//! Skip list node encoding
//!
//! ```text
//! ┌──────────┬─────────────┬───────────┬─────────────┬───────────┬─────────────────┐
//! │ code (1) │ key len (1) │ key (len) │ address (8) │ level (1) │ forward (8 * n) │
//! └──────────┴─────────────┴───────────┴─────────────┴───────────┴─────────────────┘
//! ```
//! The encoded size is fixed once the node is created, so forward pointers
//! are rewritten in place.

use crate::error::{CairnError, Result};
use crate::index::IndexKey;
use crate::page::{PageAddress, PAGE_ADDRESS_SIZE};

/// Type code of the start node
pub const START_TYPE_CODE: u8 = 0xFE;

#[derive(Debug, Clone, PartialEq)]
pub struct SkipListNode {
    /// `None` for the start node
    pub key: Option<IndexKey>,
    pub address: PageAddress,
    /// One pointer per level; the length never changes
    pub forward: Vec<PageAddress>,
}

impl SkipListNode {
    pub fn start(max_level: u8) -> Self {
        Self {
            key: None,
            address: PageAddress::EMPTY,
            forward: vec![PageAddress::EMPTY; max_level as usize],
        }
    }

    pub fn new(key: IndexKey, address: PageAddress, forward: Vec<PageAddress>) -> Self {
        Self {
            key: Some(key),
            address,
            forward,
        }
    }

    pub fn level(&self) -> usize {
        self.forward.len()
    }

    pub fn is_start(&self) -> bool {
        self.key.is_none()
    }

    fn key_len(&self) -> usize {
        self.key.as_ref().map_or(0, IndexKey::value_len)
    }

    pub fn encoded_len(&self) -> usize {
        self.forward_offset(0) + self.level() * PAGE_ADDRESS_SIZE
    }

    /// Offset of `forward[level]` inside the encoded node
    pub fn forward_offset(&self, level: usize) -> usize {
        2 + self.key_len() + PAGE_ADDRESS_SIZE + 1 + level * PAGE_ADDRESS_SIZE
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let key_len = self.key_len();
        match &self.key {
            Some(key) => {
                buf[0] = key.type_code();
                key.write_value(&mut buf[2..2 + key_len]);
            }
            None => buf[0] = START_TYPE_CODE,
        }
        buf[1] = key_len as u8;

        let mut at = 2 + key_len;
        self.address.encode(&mut buf[at..at + PAGE_ADDRESS_SIZE]);
        at += PAGE_ADDRESS_SIZE;
        buf[at] = self.level() as u8;
        at += 1;
        for pointer in &self.forward {
            pointer.encode(&mut buf[at..at + PAGE_ADDRESS_SIZE]);
            at += PAGE_ADDRESS_SIZE;
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let truncated = || {
            CairnError::Corruption(format!("truncated skip list node ({} bytes)", buf.len()))
        };
        if buf.len() < 2 {
            return Err(truncated());
        }

        let code = buf[0];
        let key_len = buf[1] as usize;
        let level_at = 2 + key_len + PAGE_ADDRESS_SIZE;
        if buf.len() <= level_at {
            return Err(truncated());
        }
        let level = buf[level_at] as usize;
        if buf.len() < level_at + 1 + level * PAGE_ADDRESS_SIZE {
            return Err(truncated());
        }

        let key = if code == START_TYPE_CODE {
            None
        } else {
            Some(IndexKey::from_parts(code, &buf[2..2 + key_len])?)
        };
        let address = PageAddress::decode(&buf[2 + key_len..level_at]);
        let forward = (0..level)
            .map(|i| {
                let at = level_at + 1 + i * PAGE_ADDRESS_SIZE;
                PageAddress::decode(&buf[at..at + PAGE_ADDRESS_SIZE])
            })
            .collect();

        Ok(Self {
            key,
            address,
            forward,
        })
    }
}
