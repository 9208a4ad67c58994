//! Append-only linked-list allocator for per-page adjacency lists.
//!
//! Each outlink or inlink list is a singly-linked chain of blocks in this
//! store; the head pointer is held by the owning trie node
//! (`outlinks_head`/`inlinks_head`), never by the store. Block 0 of the
//! store holds the [`LinkStoreHeader`] (format version, webentity-id
//! counter, record count).

pub mod node;

pub use node::{LinkNodeRecord, LinkStoreHeader, LINK_NODE_RECORD_SIZE, LINK_STORE_FORMAT_VERSION};

use crate::block::{BlockIndex, BlockStore};
use crate::error::{traversal_bug, Result};

/// Block-addressed singly-linked list store for page adjacency lists.
pub struct LinkStore<S: BlockStore> {
    store: S,
    header: LinkStoreHeader,
}

impl<S: BlockStore> LinkStore<S> {
    /// Wrap `store`, initializing its header block if the store is empty
    /// or validating the existing one otherwise.
    pub fn new(mut store: S) -> Result<Self> {
        let header = if store.block_count() == 0 {
            let header = LinkStoreHeader::default();
            store.append(&header.encode())?;
            header
        } else {
            LinkStoreHeader::decode(&store.read(0)?)?
        };
        Ok(LinkStore { store, header })
    }

    fn flush_header(&mut self) -> Result<()> {
        self.store.write_at(0, &self.header.encode())
    }

    /// Allocate the next webentity id from the header's monotonic counter.
    pub fn allocate_webentity_id(&mut self) -> Result<u32> {
        let id = self.header.next_webentity_id();
        self.flush_header()?;
        Ok(id)
    }

    pub fn format_version(&self) -> u8 {
        self.header.format_version
    }

    pub fn record_count(&self) -> u64 {
        self.header.record_count
    }

    fn push_list(
        &mut self,
        current_head: BlockIndex,
        edges: impl IntoIterator<Item = (BlockIndex, u32)>,
    ) -> Result<BlockIndex> {
        let mut head = current_head;
        for (target, weight) in edges {
            let mut record = LinkNodeRecord::new(target, weight);
            record.next = head;
            head = self.store.append(&record.encode())?;
            self.header.record_count += 1;
        }
        self.flush_header()?;
        Ok(head)
    }

    /// Prepend outlink records for `edges` (already coalesced by weight)
    /// onto the list currently headed by `current_head`, returning the
    /// new head to store back on the source trie node.
    pub fn add_outlinks(
        &mut self,
        current_head: BlockIndex,
        edges: impl IntoIterator<Item = (BlockIndex, u32)>,
    ) -> Result<BlockIndex> {
        log::trace!("appending outlink records onto head {current_head}");
        self.push_list(current_head, edges)
    }

    /// Symmetric to [`Self::add_outlinks`] for inlink lists.
    pub fn add_inlinks(
        &mut self,
        current_head: BlockIndex,
        edges: impl IntoIterator<Item = (BlockIndex, u32)>,
    ) -> Result<BlockIndex> {
        log::trace!("appending inlink records onto head {current_head}");
        self.push_list(current_head, edges)
    }

    /// Walk the list rooted at `head` until `next == 0`.
    pub fn link_nodes_iter(&mut self, head: BlockIndex) -> Result<Vec<LinkNodeRecord>> {
        let mut out = Vec::new();
        let mut cursor = head;
        let mut guard = 0usize;
        while cursor != 0 {
            guard += 1;
            if guard as u64 > self.header.record_count + 1 {
                return Err(traversal_bug("link_nodes_iter exceeded record count, cycle suspected"));
            }
            let record = LinkNodeRecord::decode(&self.store.read(cursor)?)?;
            let next = record.next;
            out.push(record);
            cursor = next;
        }
        Ok(out)
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockStore;

    fn store() -> LinkStore<MemoryBlockStore> {
        LinkStore::new(MemoryBlockStore::new(LINK_NODE_RECORD_SIZE as u32)).unwrap()
    }

    #[test]
    fn new_store_initializes_header() {
        let store = store();
        assert_eq!(store.format_version(), LINK_STORE_FORMAT_VERSION);
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn webentity_ids_are_monotonic() {
        let mut store = store();
        assert_eq!(store.allocate_webentity_id().unwrap(), 1);
        assert_eq!(store.allocate_webentity_id().unwrap(), 2);
    }

    #[test]
    fn add_and_iterate_outlinks() {
        let mut store = store();
        let head = store.add_outlinks(0, vec![(10, 2), (20, 1)]).unwrap();
        let nodes = store.link_nodes_iter(head).unwrap();
        let targets: Vec<_> = nodes.iter().map(|n| (n.target, n.weight)).collect();
        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&(10, 2)));
        assert!(targets.contains(&(20, 1)));
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn empty_head_iterates_to_nothing() {
        let mut store = store();
        assert!(store.link_nodes_iter(0).unwrap().is_empty());
    }

    #[test]
    fn reopening_preserves_header_state() {
        let mut store = store();
        store.allocate_webentity_id().unwrap();
        let head = store.add_outlinks(0, vec![(5, 1)]).unwrap();
        let inner = store.into_inner();

        let mut reopened = LinkStore::new(inner).unwrap();
        assert_eq!(reopened.header.last_webentity_id, 1);
        assert_eq!(reopened.link_nodes_iter(head).unwrap().len(), 1);
    }
}
