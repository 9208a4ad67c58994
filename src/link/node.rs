//! Packed fixed-width link-store node record and header.
//!
//! Link node layout (little-endian), 13 live bytes padded to 16:
//!
//! ```text
//! offset  size  field
//! 0       4     target
//! 4       4     next
//! 8       4     weight
//! 12      1     flags
//! 13      3     padding
//! ```
//!
//! The header occupies block 0 of the link-store file and carries the
//! metadata shared across the whole Traph (the webentity-id counter lives
//! here rather than in the trie store, since the trie's block 0 is the
//! root node itself), padded to the same 16-byte block size:
//!
//! ```text
//! offset  size  field
//! 0       1     format_version
//! 1       4     last_webentity_id
//! 5       8     record_count
//! 13      3     padding
//! ```

use crate::block::BlockIndex;
use crate::error::{Error, ErrorCode, Result};

pub const LINK_NODE_RECORD_SIZE: usize = 16;

/// Format version written by this crate. Bumping it is required before
/// changing either record's byte layout.
pub const LINK_STORE_FORMAT_VERSION: u8 = 1;

const TARGET_OFFSET: usize = 0;
const NEXT_OFFSET: usize = 4;
const WEIGHT_OFFSET: usize = 8;
const FLAGS_OFFSET: usize = 12;

/// One link-store node: an edge endpoint plus the next node in its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkNodeRecord {
    /// Block index of the peer trie node (source for an inlink, target
    /// for an outlink).
    pub target: BlockIndex,
    /// Next link node in this list, or 0.
    pub next: BlockIndex,
    /// Multi-edge coalescing count.
    pub weight: u32,
    /// Reserved bitset.
    pub flags: u8,
}

impl LinkNodeRecord {
    pub fn new(target: BlockIndex, weight: u32) -> Self {
        LinkNodeRecord {
            target,
            next: 0,
            weight,
            flags: 0,
        }
    }

    pub fn encode(&self) -> [u8; LINK_NODE_RECORD_SIZE] {
        let mut buf = [0u8; LINK_NODE_RECORD_SIZE];
        buf[TARGET_OFFSET..TARGET_OFFSET + 4].copy_from_slice(&self.target.to_le_bytes());
        buf[NEXT_OFFSET..NEXT_OFFSET + 4].copy_from_slice(&self.next.to_le_bytes());
        buf[WEIGHT_OFFSET..WEIGHT_OFFSET + 4].copy_from_slice(&self.weight.to_le_bytes());
        buf[FLAGS_OFFSET] = self.flags;
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != LINK_NODE_RECORD_SIZE {
            return Err(Error::with_detail(
                ErrorCode::BlockSizeMismatch,
                format!("link node record must be {LINK_NODE_RECORD_SIZE} bytes"),
            ));
        }
        let u32_at =
            |offset: usize| u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
        Ok(LinkNodeRecord {
            target: u32_at(TARGET_OFFSET),
            next: u32_at(NEXT_OFFSET),
            weight: u32_at(WEIGHT_OFFSET),
            flags: data[FLAGS_OFFSET],
        })
    }
}

const VERSION_OFFSET: usize = 0;
const LAST_WEBENTITY_ID_OFFSET: usize = 1;
const RECORD_COUNT_OFFSET: usize = 5;

/// Global metadata stored in block 0 of the link-store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStoreHeader {
    pub format_version: u8,
    pub last_webentity_id: u32,
    pub record_count: u64,
}

impl Default for LinkStoreHeader {
    fn default() -> Self {
        LinkStoreHeader {
            format_version: LINK_STORE_FORMAT_VERSION,
            last_webentity_id: 0,
            record_count: 0,
        }
    }
}

impl LinkStoreHeader {
    /// Allocate and return the next webentity id, bumping the counter.
    pub fn next_webentity_id(&mut self) -> u32 {
        self.last_webentity_id += 1;
        self.last_webentity_id
    }

    pub fn encode(&self) -> [u8; LINK_NODE_RECORD_SIZE] {
        let mut buf = [0u8; LINK_NODE_RECORD_SIZE];
        buf[VERSION_OFFSET] = self.format_version;
        buf[LAST_WEBENTITY_ID_OFFSET..LAST_WEBENTITY_ID_OFFSET + 4]
            .copy_from_slice(&self.last_webentity_id.to_le_bytes());
        buf[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 8]
            .copy_from_slice(&self.record_count.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != LINK_NODE_RECORD_SIZE {
            return Err(Error::with_detail(
                ErrorCode::BlockSizeMismatch,
                format!("link store header must be {LINK_NODE_RECORD_SIZE} bytes"),
            ));
        }
        let format_version = data[VERSION_OFFSET];
        if format_version != 0 && format_version != LINK_STORE_FORMAT_VERSION {
            return Err(Error::with_detail(
                ErrorCode::FormatMismatch,
                format!(
                    "link store format version {format_version} unsupported, expected {LINK_STORE_FORMAT_VERSION}"
                ),
            ));
        }
        let last_webentity_id = u32::from_le_bytes(
            data[LAST_WEBENTITY_ID_OFFSET..LAST_WEBENTITY_ID_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        let record_count = u64::from_le_bytes(
            data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 8]
                .try_into()
                .unwrap(),
        );
        Ok(LinkStoreHeader {
            format_version: if format_version == 0 {
                LINK_STORE_FORMAT_VERSION
            } else {
                format_version
            },
            last_webentity_id,
            record_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_node_roundtrip() {
        let record = LinkNodeRecord {
            target: 42,
            next: 99,
            weight: 3,
            flags: 0,
        };
        let decoded = LinkNodeRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn header_roundtrip() {
        let mut header = LinkStoreHeader::default();
        let id1 = header.next_webentity_id();
        let id2 = header.next_webentity_id();
        assert_eq!((id1, id2), (1, 2));

        let decoded = LinkStoreHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_rejects_future_version() {
        let mut buf = [0u8; LINK_NODE_RECORD_SIZE];
        buf[VERSION_OFFSET] = LINK_STORE_FORMAT_VERSION + 1;
        let err = LinkStoreHeader::decode(&buf).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FormatMismatch);
    }
}
