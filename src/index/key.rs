//! Typed index keys
//!
//! Keys are a closed set of value types. Each carries a one-byte type code
//! and a little-endian (or UTF-8) value encoding of at most 255 bytes.
//!
//! | code | variant | value bytes |
//! |------|---------|-------------|
//! | 1    | Bool    | 1           |
//! | 2    | Int32   | 4           |
//! | 3    | Int64   | 8           |
//! | 4    | UInt64  | 8           |
//! | 5    | Float64 | 8           |
//! | 6    | Text    | UTF-8       |
//! | 7    | Bytes   | raw         |

use std::cmp::Ordering;
use std::fmt;

use crate::error::{CairnError, Result};

/// Longest value encoding a key may have
pub const MAX_KEY_SIZE: usize = u8::MAX as usize;

#[derive(Debug, Clone)]
pub enum IndexKey {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl IndexKey {
    pub fn type_code(&self) -> u8 {
        match self {
            IndexKey::Bool(_) => 1,
            IndexKey::Int32(_) => 2,
            IndexKey::Int64(_) => 3,
            IndexKey::UInt64(_) => 4,
            IndexKey::Float64(_) => 5,
            IndexKey::Text(_) => 6,
            IndexKey::Bytes(_) => 7,
        }
    }

    /// Length of the value encoding
    pub fn value_len(&self) -> usize {
        match self {
            IndexKey::Bool(_) => 1,
            IndexKey::Int32(_) => 4,
            IndexKey::Int64(_) | IndexKey::UInt64(_) | IndexKey::Float64(_) => 8,
            IndexKey::Text(text) => text.len(),
            IndexKey::Bytes(bytes) => bytes.len(),
        }
    }

    /// Fail with `KeyTooLarge` when the value cannot be stored
    pub fn validate(&self) -> Result<()> {
        let size = self.value_len();
        if size > MAX_KEY_SIZE {
            return Err(CairnError::KeyTooLarge {
                size,
                max: MAX_KEY_SIZE,
            });
        }
        Ok(())
    }

    /// Write the value encoding into `buf`, which must be `value_len` bytes
    pub fn write_value(&self, buf: &mut [u8]) {
        match self {
            IndexKey::Bool(value) => buf[0] = *value as u8,
            IndexKey::Int32(value) => buf.copy_from_slice(&value.to_le_bytes()),
            IndexKey::Int64(value) => buf.copy_from_slice(&value.to_le_bytes()),
            IndexKey::UInt64(value) => buf.copy_from_slice(&value.to_le_bytes()),
            IndexKey::Float64(value) => buf.copy_from_slice(&value.to_le_bytes()),
            IndexKey::Text(text) => buf.copy_from_slice(text.as_bytes()),
            IndexKey::Bytes(bytes) => buf.copy_from_slice(bytes),
        }
    }

    /// Rebuild a key from its type code and value bytes
    pub fn from_parts(type_code: u8, value: &[u8]) -> Result<Self> {
        let key = match type_code {
            1 => IndexKey::Bool(fixed::<1>(type_code, value)?[0] != 0),
            2 => IndexKey::Int32(i32::from_le_bytes(fixed(type_code, value)?)),
            3 => IndexKey::Int64(i64::from_le_bytes(fixed(type_code, value)?)),
            4 => IndexKey::UInt64(u64::from_le_bytes(fixed(type_code, value)?)),
            5 => IndexKey::Float64(f64::from_le_bytes(fixed(type_code, value)?)),
            6 => IndexKey::Text(String::from_utf8(value.to_vec()).map_err(|e| {
                CairnError::Corruption(format!("text key is not UTF-8: {}", e))
            })?),
            7 => IndexKey::Bytes(value.to_vec()),
            other => return Err(CairnError::UnsupportedKeyType(other)),
        };
        Ok(key)
    }
}

/// Value bytes of a fixed-width key type
fn fixed<const N: usize>(type_code: u8, value: &[u8]) -> Result<[u8; N]> {
    if value.len() != N {
        return Err(CairnError::Corruption(format!(
            "key type {} expects {} value bytes, found {}",
            type_code,
            N,
            value.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(value);
    Ok(out)
}

// =============================================================================
// Ordering
// =============================================================================

impl Ord for IndexKey {
    /// Values of one type compare naturally (floats by `total_cmp`); keys of
    /// different types order by type code
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Bool(a), IndexKey::Bool(b)) => a.cmp(b),
            (IndexKey::Int32(a), IndexKey::Int32(b)) => a.cmp(b),
            (IndexKey::Int64(a), IndexKey::Int64(b)) => a.cmp(b),
            (IndexKey::UInt64(a), IndexKey::UInt64(b)) => a.cmp(b),
            (IndexKey::Float64(a), IndexKey::Float64(b)) => a.total_cmp(b),
            (IndexKey::Text(a), IndexKey::Text(b)) => a.cmp(b),
            (IndexKey::Bytes(a), IndexKey::Bytes(b)) => a.cmp(b),
            _ => self.type_code().cmp(&other.type_code()),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Bool(value) => write!(f, "{}", value),
            IndexKey::Int32(value) => write!(f, "{}", value),
            IndexKey::Int64(value) => write!(f, "{}", value),
            IndexKey::UInt64(value) => write!(f, "{}", value),
            IndexKey::Float64(value) => write!(f, "{}", value),
            IndexKey::Text(text) => write!(f, "{:?}", text),
            IndexKey::Bytes(bytes) => write!(f, "{:02x?}", bytes),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for IndexKey {
    fn from(value: bool) -> Self {
        IndexKey::Bool(value)
    }
}

impl From<i32> for IndexKey {
    fn from(value: i32) -> Self {
        IndexKey::Int32(value)
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Int64(value)
    }
}

impl From<u64> for IndexKey {
    fn from(value: u64) -> Self {
        IndexKey::UInt64(value)
    }
}

impl From<f64> for IndexKey {
    fn from(value: f64) -> Self {
        IndexKey::Float64(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::Text(value.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(value: String) -> Self {
        IndexKey::Text(value)
    }
}

impl From<Vec<u8>> for IndexKey {
    fn from(value: Vec<u8>) -> Self {
        IndexKey::Bytes(value)
    }
}

impl From<&[u8]> for IndexKey {
    fn from(value: &[u8]) -> Self {
        IndexKey::Bytes(value.to_vec())
    }
}
