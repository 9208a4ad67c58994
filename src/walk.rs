//! Ephemeral per-insertion accumulator.
//!
//! A [`WalkHistory`] is built up while a single LRU is walked into the
//! trie: it tracks the nearest-ancestor webentity seen so far (a later,
//! deeper observation overrides an earlier one) and the ordered list of
//! webentity-creation-rule prefixes encountered along the way
//! (accumulated, never overridden).

/// State accumulated during one [`crate::trie::LruTrie`] walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkHistory {
    webentity_id: Option<u32>,
    webentity_lru_prefix: Vec<u8>,
    webentity_position: usize,
    rules_to_apply: Vec<Vec<u8>>,
    page_was_created: bool,
}

impl WalkHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a webentity seen at depth `position` with prefix
    /// `lru_prefix`. Deeper observations (larger `position`) override
    /// shallower ones, matching walk order (root to leaf).
    pub fn observe_webentity(&mut self, id: u32, lru_prefix: &[u8], position: usize) {
        self.webentity_id = Some(id);
        self.webentity_lru_prefix = lru_prefix.to_vec();
        self.webentity_position = position;
    }

    /// Record a creation-rule prefix encountered along the walk. Rules
    /// accumulate in root-to-leaf order; they are never overridden.
    pub fn observe_rule(&mut self, rule_prefix: &[u8]) {
        self.rules_to_apply.push(rule_prefix.to_vec());
    }

    pub fn mark_page_created(&mut self, created: bool) {
        self.page_was_created = created;
    }

    pub fn webentity_id(&self) -> Option<u32> {
        self.webentity_id
    }

    pub fn webentity_lru_prefix(&self) -> &[u8] {
        &self.webentity_lru_prefix
    }

    pub fn webentity_position(&self) -> usize {
        self.webentity_position
    }

    pub fn rules_to_apply(&self) -> &[Vec<u8>] {
        &self.rules_to_apply
    }

    pub fn page_was_created(&self) -> bool {
        self.page_was_created
    }
}
