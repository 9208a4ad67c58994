//! Block-addressed LRU trie and link store for indexing crawled pages and
//! web entities.
//!
//! A [`traph::Traph`] couples a character-keyed trie over LRU byte strings
//! ([`trie::LruTrie`]) with a block-addressed adjacency-list store
//! ([`link::LinkStore`]) and a set of webentity-creation rules
//! ([`rules::CreationRule`]) evaluated as each page is inserted.

pub mod block;
pub mod error;
pub mod link;
pub mod rules;
pub mod traph;
pub mod trie;
pub mod walk;

pub use block::{Backing, BlockIndex, BlockStore, FileBlockStore, MemoryBlockStore};
pub use error::{Error, ErrorCode, Result};
pub use link::LinkStore;
pub use rules::{CreationRule, DefaultCreationRule};
pub use traph::{DefaultPrefixExpander, PrefixExpander, Traph, TraphConfig, WriteReport};
pub use trie::LruTrie;
pub use walk::WalkHistory;
