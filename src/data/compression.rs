//! Payload compression seam
//!
//! Records pass through a `CompressionService` before they are split into
//! blocks and after they are reassembled.

use bytes::Bytes;

use crate::error::Result;

pub trait CompressionService: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &str;

    fn compress(&self, data: &[u8]) -> Result<Bytes>;

    fn decompress(&self, data: &[u8]) -> Result<Bytes>;
}

/// Stores payloads unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCompression;

impl CompressionService for IdentityCompression {
    fn name(&self) -> &str {
        "identity"
    }

    fn compress(&self, data: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }
}
