//! Data Service

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{CairnError, Result};
use crate::page::{DataPage, PageAddress, PageId, TypedPage};
use crate::pager::PageService;

use super::{BlockHeader, CompressionService, IdentityCompression, BLOCK_HEADER_SIZE};

/// When the pages touched by an insert reach the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Write every touched page before returning
    Immediate,
    /// Leave touched pages dirty in the cache until a checkpoint or eviction
    Delayed,
}

/// Record storage on top of the page service
pub struct DataService {
    pages: Arc<PageService>,
    compression: Arc<dyn CompressionService>,
}

impl DataService {
    pub fn new(pages: Arc<PageService>, compression: Arc<dyn CompressionService>) -> Self {
        debug!("Data service using {} compression", compression.name());
        Self { pages, compression }
    }

    /// Data service that stores payloads uncompressed
    pub fn with_identity(pages: Arc<PageService>) -> Self {
        Self::new(pages, Arc::new(IdentityCompression))
    }

    pub fn pages(&self) -> &Arc<PageService> {
        &self.pages
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Serialize `value` with bincode and store it; returns the first block's address
    pub fn insert<T: Serialize>(&self, value: &T) -> Result<PageAddress> {
        let payload = bincode::serialize(value)?;
        self.insert_bytes(&payload, WriteMode::Immediate)
    }

    /// Store several values, writing each touched page once at the end
    pub fn insert_batch<T: Serialize>(&self, values: &[T]) -> Result<Vec<PageAddress>> {
        let mut touched = BTreeMap::new();
        let mut addresses = Vec::with_capacity(values.len());
        for value in values {
            let payload = bincode::serialize(value)?;
            addresses.push(self.write_record(&payload, &mut touched)?);
        }
        self.write_touched(touched)?;
        Ok(addresses)
    }

    /// Store raw bytes
    pub fn insert_bytes(&self, payload: &[u8], mode: WriteMode) -> Result<PageAddress> {
        let mut touched = BTreeMap::new();
        let address = self.write_record(payload, &mut touched)?;
        if mode == WriteMode::Immediate {
            self.write_touched(touched)?;
        }
        Ok(address)
    }

    fn write_touched(&self, touched: BTreeMap<PageId, DataPage>) -> Result<()> {
        for page in touched.values() {
            self.pages.write_page(page)?;
        }
        Ok(())
    }

    /// Compress `payload` and chain it across as many blocks as needed
    fn write_record(
        &self,
        payload: &[u8],
        touched: &mut BTreeMap<PageId, DataPage>,
    ) -> Result<PageAddress> {
        let body = self.compression.compress(payload)?;
        let owner = self.pages.begin_owner();
        let result = self.write_blocks(&body, owner, touched);
        self.pages.release_claims(owner);
        result
    }

    fn write_blocks(
        &self,
        body: &[u8],
        owner: u64,
        touched: &mut BTreeMap<PageId, DataPage>,
    ) -> Result<PageAddress> {
        let mut first = PageAddress::EMPTY;
        let mut previous = PageAddress::EMPTY;
        let mut written = 0;
        let mut blocks = 0;

        loop {
            let page = self.pages.get_data_page_with_free_space()?;
            let page_id = page.id();
            match self.pages.claim_page(page_id, owner) {
                Ok(()) => {}
                Err(CairnError::TransactionConflict { .. }) => continue,
                Err(e) => return Err(e),
            }

            let address = {
                let mut guard = page.write();
                let usable = guard.max_free_usable_bytes();
                if usable <= BLOCK_HEADER_SIZE {
                    continue;
                }
                let take = (usable - BLOCK_HEADER_SIZE).min(body.len() - written);
                let (span, slot) = guard.insert(BLOCK_HEADER_SIZE + take)?;
                BlockHeader::new(!first.is_empty()).encode(&mut span[..BLOCK_HEADER_SIZE]);
                span[BLOCK_HEADER_SIZE..].copy_from_slice(&body[written..written + take]);
                written += take;
                PageAddress::new(page_id, slot)
            };

            if previous.is_empty() {
                first = address;
            } else if let Some(previous_page) = touched.get(&previous.page_id) {
                let mut guard = previous_page.write();
                BlockHeader::link(guard.slot_mut(previous.slot_id)?, address);
            }
            touched.entry(page_id).or_insert(page);
            previous = address;
            blocks += 1;

            if written == body.len() {
                break;
            }
        }

        debug!("Stored {} bytes in {} block(s) starting at {}", body.len(), blocks, first);
        Ok(first)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Read and deserialize the record at `address`
    pub fn get<T: DeserializeOwned>(&self, address: PageAddress) -> Result<T> {
        let payload = self.get_bytes(address)?;
        Ok(bincode::deserialize(&payload)?)
    }

    /// Reassemble the raw payload of the record at `address`
    pub fn get_bytes(&self, address: PageAddress) -> Result<Bytes> {
        let mut body = BytesMut::new();
        self.walk(address, |_, block| {
            body.extend_from_slice(block);
            Ok(())
        })?;
        self.compression.decompress(&body)
    }

    /// Number of blocks the record at `address` spans
    pub fn block_count(&self, address: PageAddress) -> Result<usize> {
        let mut count = 0;
        self.walk(address, |_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Remove every block of the record at `address`; returns the block count
    pub fn delete(&self, address: PageAddress) -> Result<usize> {
        let mut chain = Vec::new();
        self.walk(address, |block_address, _| {
            chain.push(block_address);
            Ok(())
        })?;

        for block in &chain {
            let page = self
                .pages
                .get_page::<DataPage>(block.page_id)?
                .ok_or(CairnError::PageNotFound {
                    page_id: block.page_id,
                })?;
            page.write().delete(block.slot_id)?;
            self.pages.write_page(&page)?;
        }
        debug!("Deleted record at {} ({} blocks)", address, chain.len());
        Ok(chain.len())
    }

    /// Visit each block body of the chain starting at `address`
    fn walk(
        &self,
        address: PageAddress,
        mut visit: impl FnMut(PageAddress, &[u8]) -> Result<()>,
    ) -> Result<()> {
        if address.is_empty() {
            return Err(CairnError::InvalidPage {
                page_id: address.page_id,
                reason: "empty record address".to_string(),
            });
        }

        let mut visited = HashSet::new();
        let mut current = address;
        while !current.is_empty() {
            if !visited.insert(current) {
                return Err(CairnError::Corruption(format!(
                    "block chain starting at {} loops back to {}",
                    address, current
                )));
            }

            let page = self
                .pages
                .get_page::<DataPage>(current.page_id)?
                .ok_or(CairnError::PageNotFound {
                    page_id: current.page_id,
                })?;
            let guard = page.read();
            let block = guard.read(current.slot_id)?;
            if block.len() < BLOCK_HEADER_SIZE {
                return Err(CairnError::Corruption(format!(
                    "block at {} is shorter than its header",
                    current
                )));
            }

            let header = BlockHeader::decode(block);
            if current == address && header.is_following_block {
                return Err(CairnError::InvalidPage {
                    page_id: current.page_id,
                    reason: format!("{} is not the first block of a record", current),
                });
            }
            visit(current, &block[BLOCK_HEADER_SIZE..])?;
            current = header.next_block;
        }
        Ok(())
    }
}
