//! Packed fixed-width trie node record.
//!
//! Layout (little-endian, stable for the life of the file), 26 live bytes
//! padded to 32:
//!
//! ```text
//! offset  size  field
//! 0       1     char
//! 1       1     flags
//! 2       4     webentity_id
//! 6       4     parent
//! 10      4     next
//! 14      4     child
//! 18      4     outlinks_head
//! 22      4     inlinks_head
//! 26      6     padding
//! ```

use bitflags::bitflags;

use crate::block::BlockIndex;
use crate::error::{Error, ErrorCode, Result};

/// Byte size of a packed [`TrieNodeRecord`], including padding.
pub const TRIE_NODE_RECORD_SIZE: usize = 32;

const CHAR_OFFSET: usize = 0;
const FLAGS_OFFSET: usize = 1;
const WEBENTITY_ID_OFFSET: usize = 2;
const PARENT_OFFSET: usize = 6;
const NEXT_OFFSET: usize = 10;
const CHILD_OFFSET: usize = 14;
const OUTLINKS_HEAD_OFFSET: usize = 18;
const INLINKS_HEAD_OFFSET: usize = 22;

bitflags! {
    /// Per-node state flags. Extensible: unused bits are reserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Node denotes a crawled or discovered page.
        const IS_PAGE = 0x01;
        /// Node is the terminus of one or more webentity prefixes.
        const HAS_WEBENTITY = 0x02;
        /// Node is flagged as a webentity-creation-rule prefix.
        const IS_WEBENTITY_CREATION_RULE = 0x04;
    }
}

/// One trie node's fields, unpacked from (or destined for) a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieNodeRecord {
    pub char: u8,
    pub flags: NodeFlags,
    pub webentity_id: u32,
    pub parent: BlockIndex,
    pub next: BlockIndex,
    pub child: BlockIndex,
    pub outlinks_head: BlockIndex,
    pub inlinks_head: BlockIndex,
}

impl Default for TrieNodeRecord {
    fn default() -> Self {
        TrieNodeRecord {
            char: 0,
            flags: NodeFlags::empty(),
            webentity_id: 0,
            parent: 0,
            next: 0,
            child: 0,
            outlinks_head: 0,
            inlinks_head: 0,
        }
    }
}

impl TrieNodeRecord {
    /// A new, unlinked node for byte `c` under `parent`.
    pub fn new_child(c: u8, parent: BlockIndex) -> Self {
        TrieNodeRecord {
            char: c,
            parent,
            ..Default::default()
        }
    }

    pub fn is_page(&self) -> bool {
        self.flags.contains(NodeFlags::IS_PAGE)
    }

    pub fn has_webentity(&self) -> bool {
        self.flags.contains(NodeFlags::HAS_WEBENTITY)
    }

    pub fn is_rule(&self) -> bool {
        self.flags.contains(NodeFlags::IS_WEBENTITY_CREATION_RULE)
    }

    pub fn encode(&self) -> [u8; TRIE_NODE_RECORD_SIZE] {
        let mut buf = [0u8; TRIE_NODE_RECORD_SIZE];
        buf[CHAR_OFFSET] = self.char;
        buf[FLAGS_OFFSET] = self.flags.bits();
        buf[WEBENTITY_ID_OFFSET..WEBENTITY_ID_OFFSET + 4]
            .copy_from_slice(&self.webentity_id.to_le_bytes());
        buf[PARENT_OFFSET..PARENT_OFFSET + 4].copy_from_slice(&self.parent.to_le_bytes());
        buf[NEXT_OFFSET..NEXT_OFFSET + 4].copy_from_slice(&self.next.to_le_bytes());
        buf[CHILD_OFFSET..CHILD_OFFSET + 4].copy_from_slice(&self.child.to_le_bytes());
        buf[OUTLINKS_HEAD_OFFSET..OUTLINKS_HEAD_OFFSET + 4]
            .copy_from_slice(&self.outlinks_head.to_le_bytes());
        buf[INLINKS_HEAD_OFFSET..INLINKS_HEAD_OFFSET + 4]
            .copy_from_slice(&self.inlinks_head.to_le_bytes());
        buf
    }

    /// Unpack a record from exactly [`TRIE_NODE_RECORD_SIZE`] bytes. An
    /// all-zero block yields the sentinel "empty" record.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != TRIE_NODE_RECORD_SIZE {
            return Err(Error::with_detail(
                ErrorCode::BlockSizeMismatch,
                format!("trie node record must be {TRIE_NODE_RECORD_SIZE} bytes"),
            ));
        }
        let u32_at = |offset: usize| -> u32 {
            u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
        };
        let flags = NodeFlags::from_bits_truncate(data[FLAGS_OFFSET]);
        Ok(TrieNodeRecord {
            char: data[CHAR_OFFSET],
            flags,
            webentity_id: u32_at(WEBENTITY_ID_OFFSET),
            parent: u32_at(PARENT_OFFSET),
            next: u32_at(NEXT_OFFSET),
            child: u32_at(CHILD_OFFSET),
            outlinks_head: u32_at(OUTLINKS_HEAD_OFFSET),
            inlinks_head: u32_at(INLINKS_HEAD_OFFSET),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_empty_record() {
        let record = TrieNodeRecord::default();
        let bytes = record.encode();
        assert!(bytes.iter().all(|&b| b == 0));
        let decoded = TrieNodeRecord::decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn roundtrip_populated_record() {
        let record = TrieNodeRecord {
            char: b'h',
            flags: NodeFlags::IS_PAGE | NodeFlags::HAS_WEBENTITY,
            webentity_id: 7,
            parent: 3,
            next: 11,
            child: 22,
            outlinks_head: 100,
            inlinks_head: 200,
        };
        let decoded = TrieNodeRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.is_page());
        assert!(decoded.has_webentity());
        assert!(!decoded.is_rule());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = TrieNodeRecord::decode(&[0u8; 10]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BlockSizeMismatch);
    }
}
