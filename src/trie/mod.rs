//! Character-keyed radix trie over LRU byte strings.
//!
//! Every node lives in one block of an underlying [`BlockStore`]; there is
//! no in-memory node graph, only block addresses. Block 0 of a fresh
//! store is a reserved, never-addressed sentinel; block 1 is always the
//! root (the root's block index equals the first post-header block).

pub mod node;

pub use node::{NodeFlags, TrieNodeRecord, TRIE_NODE_RECORD_SIZE};

use crate::block::{BlockIndex, BlockStore};
use crate::error::{traversal_bug, Error, ErrorCode, Result};
use crate::walk::WalkHistory;

/// The root's fixed block index. Block 0 is the reserved NULL sentinel.
pub const ROOT: BlockIndex = 1;

/// Character-keyed trie over LRU byte strings, backed by a [`BlockStore`].
pub struct LruTrie<S: BlockStore> {
    store: S,
}

impl<S: BlockStore> LruTrie<S> {
    /// Wrap `store`. A fresh (empty) store is initialized with the
    /// reserved sentinel block and the root node; a non-empty store is
    /// validated to already contain at least those two blocks.
    pub fn new(mut store: S) -> Result<Self> {
        if store.block_count() == 0 {
            store.append(&vec![0u8; TRIE_NODE_RECORD_SIZE])?; // reserved block 0
            store.append(&TrieNodeRecord::default().encode())?; // root, block 1
        } else if store.block_count() < 2 {
            return Err(Error::with_detail(
                ErrorCode::StorageInconsistent,
                "trie store has fewer than the two required header/root blocks",
            ));
        }
        Ok(LruTrie { store })
    }

    pub fn root(&self) -> BlockIndex {
        ROOT
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn read_node(&mut self, idx: BlockIndex) -> Result<TrieNodeRecord> {
        TrieNodeRecord::decode(&self.store.read(idx)?)
    }

    fn write_node(&mut self, idx: BlockIndex, node: &TrieNodeRecord) -> Result<()> {
        self.store.write_at(idx, &node.encode())
    }

    fn append_node(&mut self, node: &TrieNodeRecord) -> Result<BlockIndex> {
        self.store.append(&node.encode())
    }

    /// Read a node's full record by block index. Exposed so the
    /// coordinator can inspect/flag arbitrary nodes (e.g. when flagging
    /// webentity prefixes produced by rule expansion).
    pub fn node(&mut self, idx: BlockIndex) -> Result<TrieNodeRecord> {
        self.read_node(idx)
    }

    pub fn set_node(&mut self, idx: BlockIndex, node: &TrieNodeRecord) -> Result<()> {
        self.write_node(idx, node)
    }

    /// Flag `idx` as a webentity terminus with the given id.
    pub fn flag_webentity(&mut self, idx: BlockIndex, webentity_id: u32) -> Result<()> {
        let mut node = self.read_node(idx)?;
        node.flags.insert(NodeFlags::HAS_WEBENTITY);
        node.webentity_id = webentity_id;
        self.write_node(idx, &node)
    }

    /// Flag `idx` as a webentity-creation-rule prefix.
    pub fn flag_rule(&mut self, idx: BlockIndex) -> Result<()> {
        let mut node = self.read_node(idx)?;
        node.flags.insert(NodeFlags::IS_WEBENTITY_CREATION_RULE);
        self.write_node(idx, &node)
    }

    /// Clear the rule flag on `idx`.
    pub fn unflag_rule(&mut self, idx: BlockIndex) -> Result<()> {
        let mut node = self.read_node(idx)?;
        node.flags.remove(NodeFlags::IS_WEBENTITY_CREATION_RULE);
        self.write_node(idx, &node)
    }

    /// Scan the sibling list rooted at `first_child` for byte `c`,
    /// creating a node for it under `parent` if absent. Observes any
    /// webentity/rule flags on *existing* nodes visited along the scan
    /// into `history`, at depth `depth` (1-based: the number of bytes
    /// consumed once this node is included).
    fn find_or_create_sibling(
        &mut self,
        parent: BlockIndex,
        first_child: BlockIndex,
        c: u8,
        lru_prefix: &[u8],
        depth: usize,
        history: &mut WalkHistory,
    ) -> Result<BlockIndex> {
        let mut cursor = first_child;
        let mut prev: Option<BlockIndex> = None;
        while cursor != 0 {
            let node = self.read_node(cursor)?;
            if node.char == c {
                if node.has_webentity() {
                    history.observe_webentity(node.webentity_id, lru_prefix, depth);
                }
                if node.is_rule() {
                    history.observe_rule(lru_prefix);
                }
                return Ok(cursor);
            }
            prev = Some(cursor);
            cursor = node.next;
        }

        let new_node = TrieNodeRecord::new_child(c, parent);
        let new_idx = self.append_node(&new_node)?;
        match prev {
            Some(prev_idx) => {
                let mut prev_node = self.read_node(prev_idx)?;
                prev_node.next = new_idx;
                self.write_node(prev_idx, &prev_node)?;
            }
            None => {
                let mut parent_node = self.read_node(parent)?;
                parent_node.child = new_idx;
                self.write_node(parent, &parent_node)?;
            }
        }
        log::trace!(
            "created trie node {new_idx} for byte {c:#04x} under parent {parent}"
        );
        Ok(new_idx)
    }

    /// Insert `lru`, returning its terminal node and the walk history
    /// accumulated along the way. An empty `lru` denotes the root and
    /// creates no new node.
    pub fn add_lru(&mut self, lru: &[u8]) -> Result<(BlockIndex, WalkHistory)> {
        let mut history = WalkHistory::new();
        if lru.is_empty() {
            return Ok((ROOT, history));
        }

        let mut parent = ROOT;
        let mut first_child = self.read_node(ROOT)?.child;
        let mut node_idx = ROOT;

        for (i, &c) in lru.iter().enumerate() {
            let prefix = &lru[..=i];
            node_idx = self.find_or_create_sibling(parent, first_child, c, prefix, i + 1, &mut history)?;
            parent = node_idx;
            if i + 1 < lru.len() {
                first_child = self.read_node(node_idx)?.child;
            }
        }

        Ok((node_idx, history))
    }

    /// Insert `lru` and flag its terminal node `IS_PAGE`.
    /// `history.page_was_created()` reports whether this call newly set
    /// the flag.
    pub fn add_page(&mut self, lru: &[u8]) -> Result<(BlockIndex, WalkHistory)> {
        let (node_idx, mut history) = self.add_lru(lru)?;
        let mut node = self.read_node(node_idx)?;
        let created = !node.is_page();
        if created {
            node.flags.insert(NodeFlags::IS_PAGE);
            self.write_node(node_idx, &node)?;
            log::debug!("flagged node {node_idx} as a page");
        }
        history.mark_page_created(created);
        Ok((node_idx, history))
    }

    /// Point lookup: the terminal node for `lru`, or `None` if absent.
    pub fn lookup(&mut self, lru: &[u8]) -> Result<Option<BlockIndex>> {
        if lru.is_empty() {
            return Ok(Some(ROOT));
        }
        let mut cursor = self.read_node(ROOT)?.child;
        let mut found = None;
        for &c in lru {
            let mut scan = cursor;
            let mut matched = None;
            while scan != 0 {
                let node = self.read_node(scan)?;
                if node.char == c {
                    matched = Some((scan, node));
                    break;
                }
                scan = node.next;
            }
            match matched {
                Some((idx, node)) => {
                    found = Some(idx);
                    cursor = node.child;
                }
                None => return Ok(None),
            }
        }
        Ok(found)
    }

    /// Reconstruct `node`'s LRU by walking `parent` pointers to the root.
    pub fn windup(&mut self, node: BlockIndex) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut cursor = node;
        let mut guard = 0u64;
        while cursor != ROOT {
            if cursor == 0 {
                return Err(traversal_bug("windup followed a null parent pointer"));
            }
            guard += 1;
            if guard > self.store.block_count() as u64 + 1 {
                return Err(traversal_bug("windup exceeded block count, cycle suspected"));
            }
            let rec = self.read_node(cursor)?;
            bytes.push(rec.char);
            cursor = rec.parent;
        }
        bytes.reverse();
        Ok(bytes)
    }

    /// Pre-order depth-first walk of the subtree rooted at `start`
    /// (itself addressed by `start_lru`), yielding `(node, lru)` pairs.
    /// `start`'s own sibling chain is not followed, only its descendants.
    pub fn dfs_from(&mut self, start: BlockIndex, start_lru: Vec<u8>) -> Result<Vec<(BlockIndex, Vec<u8>)>> {
        let mut out = Vec::new();
        let start_rec = self.read_node(start)?;
        out.push((start, start_lru.clone()));

        let mut stack = Vec::new();
        if start_rec.child != 0 {
            let mut child_lru = start_lru;
            child_lru.push(self.read_node(start_rec.child)?.char);
            stack.push((start_rec.child, child_lru));
        }

        while let Some((node_idx, lru)) = stack.pop() {
            let rec = self.read_node(node_idx)?;
            out.push((node_idx, lru.clone()));

            if rec.next != 0 {
                let mut sibling_lru = lru.clone();
                sibling_lru.pop();
                sibling_lru.push(self.read_node(rec.next)?.char);
                stack.push((rec.next, sibling_lru));
            }
            if rec.child != 0 {
                let mut child_lru = lru;
                child_lru.push(self.read_node(rec.child)?.char);
                stack.push((rec.child, child_lru));
            }
        }
        Ok(out)
    }

    /// Pre-order depth-first walk of the whole trie. The root is yielded
    /// too, with an empty LRU.
    pub fn dfs(&mut self) -> Result<Vec<(BlockIndex, Vec<u8>)>> {
        self.dfs_from(ROOT, Vec::new())
    }

    /// DFS filtered to nodes carrying `IS_PAGE`.
    pub fn pages_iter(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for (idx, lru) in self.dfs()? {
            if self.read_node(idx)?.is_page() {
                out.push(lru);
            }
        }
        Ok(out)
    }

    /// DFS filtered to nodes carrying `HAS_WEBENTITY`, yielding
    /// `(webentity_id, lru_prefix)`.
    pub fn webentity_prefix_iter(&mut self) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut out = Vec::new();
        for (idx, lru) in self.dfs()? {
            let node = self.read_node(idx)?;
            if node.has_webentity() {
                out.push((node.webentity_id, lru));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockStore;

    fn trie() -> LruTrie<MemoryBlockStore> {
        LruTrie::new(MemoryBlockStore::new(TRIE_NODE_RECORD_SIZE as u32)).unwrap()
    }

    #[test]
    fn windup_roundtrips_for_every_node() {
        let mut t = trie();
        let (leaf, _) = t.add_lru(b"s:http|h:com|").unwrap();
        for (idx, lru) in t.dfs().unwrap() {
            let rewound = t.windup(idx).unwrap();
            assert_eq!(rewound, lru);
        }
        assert_eq!(t.windup(leaf).unwrap(), b"s:http|h:com|");
    }

    #[test]
    fn shared_prefix_two_leaves() {
        let mut t = trie();
        let (a, _) = t.add_page(b"s:http|h:com|h:example|p:a").unwrap();
        let (b, _) = t.add_page(b"s:http|h:com|h:example|p:b").unwrap();
        assert_ne!(a, b);
        assert!(t.node(a).unwrap().is_page());
        assert!(t.node(b).unwrap().is_page());

        let common = t.lookup(b"s:http|h:com|h:example|").unwrap().unwrap();
        assert!(!t.node(common).unwrap().is_page());
    }

    #[test]
    fn dfs_from_does_not_cross_into_the_start_nodes_siblings() {
        let mut t = trie();
        t.add_lru(b"ax").unwrap();
        t.add_lru(b"bx").unwrap();

        let a = t.lookup(b"a").unwrap().unwrap();
        let visited = t.dfs_from(a, b"a".to_vec()).unwrap();
        let lrus: Vec<_> = visited.into_iter().map(|(_, lru)| lru).collect();
        assert_eq!(lrus, vec![b"a".to_vec(), b"ax".to_vec()]);
    }

    #[test]
    fn single_byte_lru_creates_one_node() {
        let mut t = trie();
        let before = t.dfs().unwrap().len();
        t.add_lru(b"x").unwrap();
        let after = t.dfs().unwrap().len();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn prefix_of_existing_lru_adds_no_nodes() {
        let mut t = trie();
        t.add_page(b"s:http|h:com|h:example|").unwrap();
        let before = t.dfs().unwrap().len();
        let (_, history) = t.add_page(b"s:http|h:com|").unwrap();
        let after = t.dfs().unwrap().len();
        assert_eq!(before, after);
        assert!(history.page_was_created());
    }

    #[test]
    fn repeated_add_page_is_idempotent() {
        let mut t = trie();
        let (n1, h1) = t.add_page(b"s:http|h:com|").unwrap();
        assert!(h1.page_was_created());
        let nodes_after_first = t.dfs().unwrap().len();

        let (n2, h2) = t.add_page(b"s:http|h:com|").unwrap();
        assert_eq!(n1, n2);
        assert!(!h2.page_was_created());
        assert_eq!(t.dfs().unwrap().len(), nodes_after_first);
    }

    #[test]
    fn empty_lru_is_the_root() {
        let mut t = trie();
        assert_eq!(t.lookup(b"").unwrap(), Some(ROOT));
        let (idx, _) = t.add_page(b"").unwrap();
        assert_eq!(idx, ROOT);
        assert!(t.node(ROOT).unwrap().is_page());
    }

    #[test]
    fn lookup_missing_returns_none() {
        let mut t = trie();
        t.add_page(b"s:http|h:com|").unwrap();
        assert_eq!(t.lookup(b"s:http|h:net|").unwrap(), None);
    }

    #[test]
    fn sibling_characters_are_unique() {
        let mut t = trie();
        t.add_lru(b"a").unwrap();
        t.add_lru(b"b").unwrap();
        t.add_lru(b"a").unwrap();

        let mut seen = std::collections::HashSet::new();
        let child = t.node(ROOT).unwrap().child;
        let mut cursor = child;
        while cursor != 0 {
            let node = t.node(cursor).unwrap();
            assert!(seen.insert(node.char), "duplicate sibling char");
            cursor = node.next;
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn reopening_memory_store_preserves_structure() {
        let mut t = trie();
        t.add_page(b"s:http|h:com|").unwrap();
        let inner = t.into_inner();

        let mut reopened = LruTrie::new(inner).unwrap();
        assert!(reopened
            .lookup(b"s:http|h:com|")
            .unwrap()
            .map(|idx| reopened.node(idx).unwrap().is_page())
            .unwrap_or(false));
    }
}
