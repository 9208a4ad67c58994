//! The Traph coordinator: wires the [`LruTrie`], [`LinkStore`], creation
//! rules and [`WalkHistory`] together into the crate's public surface.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::block::{Backing, BlockIndex, FileBlockStore, MemoryBlockStore};
use crate::error::{Error, ErrorCode, Result};
use crate::link::{LinkStore, LINK_NODE_RECORD_SIZE};
use crate::rules::{CreationRule, DefaultCreationRule};
use crate::trie::{LruTrie, TRIE_NODE_RECORD_SIZE};
use crate::walk::WalkHistory;

const TRIE_FILE_NAME: &str = "lru_trie.dat";
const LINK_FILE_NAME: &str = "link_store.dat";

/// Policy for turning a rule-matched candidate prefix into the set of LRU
/// prefixes actually flagged as the webentity (`lru_variations`). The
/// built-in default is a minimal placeholder; deployments with real
/// URL-normalization needs are expected to supply their own.
pub trait PrefixExpander: Send {
    fn expand(&self, candidate: &[u8]) -> Vec<Vec<u8>>;
}

/// Minimal built-in policy: the candidate itself, plus an `http`/`https`
/// scheme-token swap and a trailing-separator variant when applicable.
/// Real deployments are expected to supply a richer [`PrefixExpander`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPrefixExpander;

impl PrefixExpander for DefaultPrefixExpander {
    fn expand(&self, candidate: &[u8]) -> Vec<Vec<u8>> {
        let mut variations = std::collections::BTreeSet::new();
        variations.insert(candidate.to_vec());

        if let Some(rest) = candidate.strip_prefix(b"s:http|".as_slice()) {
            let mut https = b"s:https|".to_vec();
            https.extend_from_slice(rest);
            variations.insert(https);
        } else if let Some(rest) = candidate.strip_prefix(b"s:https|".as_slice()) {
            let mut http = b"s:http|".to_vec();
            http.extend_from_slice(rest);
            variations.insert(http);
        }

        if candidate.last() != Some(&b'|') {
            let mut with_sep = candidate.to_vec();
            with_sep.push(b'|');
            variations.insert(with_sep);
        }

        variations.into_iter().collect()
    }
}

/// Configuration for opening or creating a [`Traph`].
pub struct TraphConfig {
    /// Backing folder. `None` means an in-memory, non-persistent Traph.
    pub folder: Option<PathBuf>,
    /// Truncate any existing store files rather than opening them.
    pub overwrite: bool,
    /// Pattern for the fallback creation rule applied when no installed
    /// rule matches.
    pub default_creation_rule_pattern: String,
    /// Rules to install at construction time, in order, as
    /// `(rule_prefix, pattern)`. Installed with `write_in_trie = true`.
    pub initial_rules: Vec<(Vec<u8>, String)>,
    /// Candidate-to-variations policy. Defaults to [`DefaultPrefixExpander`].
    pub prefix_expander: Option<Box<dyn PrefixExpander>>,
}

impl Default for TraphConfig {
    fn default() -> Self {
        TraphConfig {
            folder: None,
            overwrite: false,
            default_creation_rule_pattern: r"^.*$".to_string(),
            initial_rules: Vec::new(),
            prefix_expander: None,
        }
    }
}

/// Summary of the writes performed by one coordinator call. Implements
/// `Add`/merge so callers can fold reports from a batch of calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub pages_created: u64,
    pub links_created: u64,
    /// Webentities created during this call, keyed by id, each mapped to
    /// the LRU prefixes flagged for it (the `lru_variations` output).
    pub webentities_created: HashMap<u32, Vec<Vec<u8>>>,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.pages_created += other.pages_created;
        self.links_created += other.links_created;
        for (id, prefixes) in other.webentities_created {
            self.webentities_created.entry(id).or_default().extend(prefixes);
        }
    }
}

impl std::ops::Add for WriteReport {
    type Output = WriteReport;

    fn add(mut self, rhs: WriteReport) -> WriteReport {
        self.merge(rhs);
        self
    }
}

/// The coordinator tying an [`LruTrie`] and [`LinkStore`] together with
/// webentity-creation rules. Not generic over storage backend: it
/// always runs atop [`Backing`], which dispatches to a file or an
/// in-memory store depending on how it was opened.
pub struct Traph {
    trie: LruTrie<Backing>,
    links: LinkStore<Backing>,
    rules: HashMap<Vec<u8>, CreationRule>,
    default_rule: DefaultCreationRule,
    expander: Box<dyn PrefixExpander>,
}

impl Traph {
    /// Open (or create) a Traph per `config`. A folder path opens or
    /// creates `lru_trie.dat`/`link_store.dat` inside it; no folder path
    /// builds a transient in-memory Traph.
    pub fn open(config: TraphConfig) -> Result<Self> {
        let (trie_backing, link_backing) = match &config.folder {
            Some(folder) => Self::open_file_backings(folder, config.overwrite)?,
            None => (
                Backing::Memory(MemoryBlockStore::new(TRIE_NODE_RECORD_SIZE as u32)),
                Backing::Memory(MemoryBlockStore::new(LINK_NODE_RECORD_SIZE as u32)),
            ),
        };

        let trie = LruTrie::new(trie_backing)?;
        let links = LinkStore::new(link_backing)?;
        let default_rule = DefaultCreationRule::new(&config.default_creation_rule_pattern)?;
        let expander = config
            .prefix_expander
            .unwrap_or_else(|| Box::new(DefaultPrefixExpander));

        let mut traph = Traph {
            trie,
            links,
            rules: HashMap::new(),
            default_rule,
            expander,
        };

        for (prefix, pattern) in config.initial_rules {
            traph.add_webentity_creation_rule(&prefix, &pattern, true)?;
        }

        Ok(traph)
    }

    fn open_file_backings(folder: &Path, overwrite: bool) -> Result<(Backing, Backing)> {
        std::fs::create_dir_all(folder)?;
        let trie_path = folder.join(TRIE_FILE_NAME);
        let link_path = folder.join(LINK_FILE_NAME);

        let trie_exists = trie_path.exists();
        let link_exists = link_path.exists();
        if !overwrite && trie_exists != link_exists {
            return Err(Error::with_detail(
                ErrorCode::StorageInconsistent,
                "exactly one of lru_trie.dat / link_store.dat exists",
            ));
        }

        let trie_store = if overwrite {
            FileBlockStore::create_truncated(&trie_path, TRIE_NODE_RECORD_SIZE as u32)?
        } else {
            FileBlockStore::open(&trie_path, TRIE_NODE_RECORD_SIZE as u32)?
        };
        let link_store = if overwrite {
            FileBlockStore::create_truncated(&link_path, LINK_NODE_RECORD_SIZE as u32)?
        } else {
            FileBlockStore::open(&link_path, LINK_NODE_RECORD_SIZE as u32)?
        };

        log::debug!("opened Traph store at {}", folder.display());
        Ok((Backing::File(trie_store), Backing::File(link_store)))
    }

    /// Insert `lru` as a page, applying whichever webentity-creation rule
    /// (installed, or the default fallback) yields the longest candidate
    /// prefix not already covered by an existing ancestor webentity.
    pub fn add_page(&mut self, lru: &[u8]) -> Result<WriteReport> {
        let mut report = WriteReport::default();
        let (_, history) = self.trie.add_page(lru)?;
        if history.page_was_created() {
            report.pages_created += 1;
        }
        self.resolve_creation_rules(lru, &history, &mut report)?;
        Ok(report)
    }

    fn resolve_creation_rules(
        &mut self,
        lru: &[u8],
        history: &WalkHistory,
        report: &mut WriteReport,
    ) -> Result<()> {
        let mut candidate: Option<Vec<u8>> = None;
        for rule_prefix in history.rules_to_apply() {
            let Some(rule) = self.rules.get(rule_prefix) else {
                continue;
            };
            if let Some(c) = rule.candidate_prefix(lru) {
                if candidate.as_ref().map_or(true, |cur| c.len() > cur.len()) {
                    candidate = Some(c);
                }
            }
        }
        if candidate.is_none() {
            candidate = self.default_rule.candidate_prefix(lru);
        }

        let Some(candidate) = candidate else {
            return Ok(());
        };
        // An ancestor webentity already covers `candidate` if its prefix
        // is at least as long as the one we'd create here.
        if !candidate.is_empty() && candidate.len() <= history.webentity_position() {
            return Ok(());
        }

        self.create_webentity(&candidate, report)
    }

    fn create_webentity(&mut self, candidate: &[u8], report: &mut WriteReport) -> Result<()> {
        let variations = self.expander.expand(candidate);
        let id = self.links.allocate_webentity_id()?;
        let mut flagged = Vec::with_capacity(variations.len());
        for variation in &variations {
            let (node_idx, _) = self.trie.add_lru(variation)?;
            self.trie.flag_webentity(node_idx, id)?;
            flagged.push(variation.clone());
        }
        log::debug!(
            "created webentity {id} from candidate prefix ({} byte(s), {} variation(s))",
            candidate.len(),
            flagged.len()
        );
        report.webentities_created.insert(id, flagged);
        Ok(())
    }

    fn ensure_page(
        &mut self,
        lru: &[u8],
        cache: &mut HashMap<Vec<u8>, BlockIndex>,
        report: &mut WriteReport,
    ) -> Result<BlockIndex> {
        if let Some(&idx) = cache.get(lru) {
            return Ok(idx);
        }
        let (node_idx, history) = self.trie.add_page(lru)?;
        if history.page_was_created() {
            report.pages_created += 1;
        }
        self.resolve_creation_rules(lru, &history, report)?;
        cache.insert(lru.to_vec(), node_idx);
        Ok(node_idx)
    }

    /// Insert a batch of `(source_lru, target_lru)` links. Every LRU is
    /// added as a page at most once; outlink and inlink multi-edges are
    /// coalesced by weight before being flushed to the link store, one
    /// call per source (or target) node.
    pub fn add_links<I>(&mut self, pairs: I) -> Result<WriteReport>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = pairs.into_iter().collect();
        let mut report = WriteReport::default();
        let mut page_cache: HashMap<Vec<u8>, BlockIndex> = HashMap::new();

        let mut resolved = Vec::with_capacity(pairs.len());
        for (src, tgt) in &pairs {
            let src_idx = self.ensure_page(src, &mut page_cache, &mut report)?;
            let tgt_idx = self.ensure_page(tgt, &mut page_cache, &mut report)?;
            resolved.push((src_idx, tgt_idx));
        }

        let mut outlinks: HashMap<BlockIndex, HashMap<BlockIndex, u32>> = HashMap::new();
        let mut inlinks: HashMap<BlockIndex, HashMap<BlockIndex, u32>> = HashMap::new();
        for (src_idx, tgt_idx) in &resolved {
            *outlinks.entry(*src_idx).or_default().entry(*tgt_idx).or_insert(0) += 1;
            *inlinks.entry(*tgt_idx).or_default().entry(*src_idx).or_insert(0) += 1;
        }

        for (src_idx, targets) in outlinks {
            let mut node = self.trie.node(src_idx)?;
            report.links_created += targets.len() as u64;
            node.outlinks_head = self.links.add_outlinks(node.outlinks_head, targets)?;
            self.trie.set_node(src_idx, &node)?;
        }
        for (tgt_idx, sources) in inlinks {
            let mut node = self.trie.node(tgt_idx)?;
            report.links_created += sources.len() as u64;
            node.inlinks_head = self.links.add_inlinks(node.inlinks_head, sources)?;
            self.trie.set_node(tgt_idx, &node)?;
        }

        Ok(report)
    }

    /// Install a webentity-creation rule at `rule_prefix`. When
    /// `write_in_trie` is set the rule's prefix node is flagged in the
    /// trie and every existing page beneath it is replayed through
    /// [`Self::resolve_creation_rules`] (retroactive application).
    pub fn add_webentity_creation_rule(
        &mut self,
        rule_prefix: &[u8],
        pattern: &str,
        write_in_trie: bool,
    ) -> Result<WriteReport> {
        let rule = CreationRule::new(rule_prefix.to_vec(), pattern)?;
        let mut report = WriteReport::default();

        if write_in_trie {
            let (node_idx, _) = self.trie.add_lru(rule_prefix)?;
            self.trie.flag_rule(node_idx)?;
            self.rules.insert(rule_prefix.to_vec(), rule);

            let descendants = self.trie.dfs_from(node_idx, rule_prefix.to_vec())?;
            for (idx, lru) in descendants {
                if self.trie.node(idx)?.is_page() {
                    let (_, history) = self.trie.add_lru(&lru)?;
                    self.resolve_creation_rules(&lru, &history, &mut report)?;
                }
            }
        } else {
            self.rules.insert(rule_prefix.to_vec(), rule);
        }

        Ok(report)
    }

    /// Remove a previously-installed rule, clearing its trie flag.
    pub fn remove_webentity_creation_rule(&mut self, rule_prefix: &[u8]) -> Result<()> {
        let node_idx = self
            .trie
            .lookup(rule_prefix)?
            .ok_or_else(|| Error::with_detail(ErrorCode::RuleInstallation, "no node at rule prefix"))?;
        if !self.trie.node(node_idx)?.is_rule() {
            return Err(Error::with_detail(
                ErrorCode::RuleInstallation,
                "no rule installed at prefix",
            ));
        }
        self.trie.unflag_rule(node_idx)?;
        self.rules.remove(rule_prefix);
        Ok(())
    }

    /// Expand a candidate prefix into the LRU variations that would be
    /// flagged as a webentity for it, without actually creating one.
    pub fn expand_prefix(&self, candidate: &[u8]) -> Vec<Vec<u8>> {
        self.expander.expand(candidate)
    }

    pub fn pages_iter(&mut self) -> Result<Vec<Vec<u8>>> {
        self.trie.pages_iter()
    }

    pub fn webentity_prefix_iter(&mut self) -> Result<Vec<(u32, Vec<u8>)>> {
        self.trie.webentity_prefix_iter()
    }

    /// Every stored edge as `(source_lru, target_lru, weight)`, read from
    /// each node's outlink list (the symmetric inlink lists mirror these
    /// and are not walked here to avoid double-reporting each edge).
    pub fn links_iter(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>, u32)>> {
        let mut out = Vec::new();
        for (node_idx, lru) in self.trie.dfs()? {
            let node = self.trie.node(node_idx)?;
            if node.outlinks_head == 0 {
                continue;
            }
            for link in self.links.link_nodes_iter(node.outlinks_head)? {
                let target_lru = self.trie.windup(link.target)?;
                out.push((lru.clone(), target_lru, link.weight));
            }
        }
        Ok(out)
    }
}
