//! Hash Slot Algorithm - CRC16 mod 16384
//!
//! Redis-compatible hash slot calculation. Keys are raw bytes: cluster keys are
//! binary-safe, so a tag is located by byte index, never by char boundary.

use crate::error::RouterError;
use crate::types::TOTAL_SLOTS;
use crc::{CRC_16_XMODEM, Crc};

/// CRC16/XMODEM: polynomial 0x1021, zero initial register, no reflection
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const SLOT_MASK: u16 = TOTAL_SLOTS - 1;

/// Calculate CRC16 checksum (Redis-compatible)
fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Extract hash tag from key (Redis-compatible)
///
/// Only the first `{` counts, closed by the first `}` after it. An empty tag
/// (`{}`) or an unmatched brace means the whole key is hashed.
fn extract_hash_tag(key: &[u8]) -> Option<&[u8]> {
    let start = key.iter().position(|&b| b == b'{')?;
    let len = key[start + 1..].iter().position(|&b| b == b'}')?;
    if len == 0 {
        return None;
    }
    Some(&key[start + 1..start + 1 + len])
}

/// Calculate hash slot for a key (CRC16 & 16383)
///
/// # Example
/// ```
/// use synap_router::hash_slot;
///
/// let slot = hash_slot(b"user:1001");
/// assert!(slot < 16384);
///
/// // Hash tags ensure same slot
/// assert_eq!(hash_slot(b"user:{1001}:profile"), hash_slot(b"user:{1001}:settings"));
/// ```
pub fn hash_slot(key: &[u8]) -> u16 {
    if key.is_empty() {
        return 0;
    }
    let hash_key = extract_hash_tag(key).unwrap_or(key);
    crc16(hash_key) & SLOT_MASK
}

/// Slot of an optional routing key; absent keys route to slot 0
pub fn slot(key: Option<&[u8]>) -> HashSlot {
    HashSlot(key.map(hash_slot).unwrap_or(0))
}

/// Hash slot type wrapper, always within `0..16384`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashSlot(u16);

impl HashSlot {
    /// Create a new hash slot (validates range)
    pub fn new(slot: u16) -> Self {
        assert!(slot < TOTAL_SLOTS, "Slot must be < 16384");
        Self(slot)
    }

    /// Get the slot number
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Calculate hash slot from key
    pub fn from_key(key: &[u8]) -> Self {
        Self(hash_slot(key))
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u16> for HashSlot {
    type Error = RouterError;

    fn try_from(slot: u16) -> Result<Self, Self::Error> {
        if slot < TOTAL_SLOTS {
            Ok(Self(slot))
        } else {
            Err(RouterError::InvalidSlot(slot))
        }
    }
}

impl From<HashSlot> for u16 {
    fn from(slot: HashSlot) -> Self {
        slot.0
    }
}

impl std::fmt::Display for HashSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
