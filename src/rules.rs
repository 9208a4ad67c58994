//! Webentity-creation rules.
//!
//! A creation rule pairs an LRU prefix (the trie location the rule is
//! installed at) with a compiled pattern. On page insertion the pattern
//! is matched against the full inserted LRU; a match anchored at byte 0
//! yields a *candidate prefix* for a new webentity. Patterns are expected
//! to be anchored (`^...`) by the caller, since an unanchored match that
//! doesn't start at byte 0 does not name a prefix and is treated as a
//! non-match.

use regex::bytes::Regex;

use crate::error::{Error, ErrorCode, Result};

/// A single webentity-creation rule: where it lives in the trie, and the
/// pattern it proposes prefixes with.
#[derive(Debug, Clone)]
pub struct CreationRule {
    pub prefix: Vec<u8>,
    pattern: Regex,
}

impl CreationRule {
    pub fn new(prefix: impl Into<Vec<u8>>, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::with_detail(ErrorCode::RuleInstallation, e.to_string()))?;
        Ok(CreationRule {
            prefix: prefix.into(),
            pattern,
        })
    }

    /// Match this rule's pattern against `lru`, returning the candidate
    /// prefix if the match starts at byte 0.
    pub fn candidate_prefix(&self, lru: &[u8]) -> Option<Vec<u8>> {
        self.pattern
            .find(lru)
            .filter(|m| m.start() == 0)
            .map(|m| m.as_bytes().to_vec())
    }

    pub fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// The fallback rule applied when no installed rule matches.
#[derive(Debug, Clone)]
pub struct DefaultCreationRule {
    pattern: Regex,
}

impl DefaultCreationRule {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::with_detail(ErrorCode::RuleInstallation, e.to_string()))?;
        Ok(DefaultCreationRule { pattern })
    }

    pub fn candidate_prefix(&self, lru: &[u8]) -> Option<Vec<u8>> {
        self.pattern
            .find(lru)
            .filter(|m| m.start() == 0)
            .map(|m| m.as_bytes().to_vec())
    }
}

impl Default for DefaultCreationRule {
    /// A permissive default: the whole LRU is the candidate prefix. Real
    /// deployments are expected to supply a host-stem pattern via
    /// `TraphConfig::default_webentity_creation_rule`.
    fn default() -> Self {
        DefaultCreationRule::new(r"^.*$").expect("built-in default pattern is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_matches_anchored_prefix() {
        let rule = CreationRule::new(b"s:http|h:com|".to_vec(), r"^s:http\|h:com\|h:[^|]+\|").unwrap();
        let lru = b"s:http|h:com|h:example|p:a";
        assert_eq!(
            rule.candidate_prefix(lru),
            Some(b"s:http|h:com|h:example|".to_vec())
        );
    }

    #[test]
    fn rule_ignores_non_anchored_match() {
        let rule = CreationRule::new(b"".to_vec(), r"h:example\|").unwrap();
        let lru = b"s:http|h:com|h:example|p:a";
        assert_eq!(rule.candidate_prefix(lru), None);
    }

    #[test]
    fn default_rule_matches_whole_lru() {
        let default = DefaultCreationRule::default();
        let lru = b"s:http|h:com|p:a";
        assert_eq!(default.candidate_prefix(lru), Some(lru.to_vec()));
    }
}
