//! Candidate index over decision file patterns.
//!
//! The trie is a pre-filter: [`PatternTrie::find_candidates`] returns a
//! superset of the decisions whose patterns can match a path. It never drops
//! a true match, but callers must re-check each candidate with the exact glob
//! matcher.

use std::collections::{BTreeSet, HashMap};

use crate::glob::{Segment, segments};

/// Position of a decision in the slice the trie was built from.
pub type DecisionIndex = usize;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, usize>,
    /// Decisions whose pattern ends exactly at this node.
    decisions: BTreeSet<DecisionIndex>,
    /// Decisions that may match any path reaching this node.
    wildcard_decisions: BTreeSet<DecisionIndex>,
}

#[derive(Debug)]
pub struct PatternTrie {
    nodes: Vec<TrieNode>,
    patterns: usize,
}

impl Default for PatternTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            patterns: 0,
        }
    }

    /// Build from `(decision, pattern)` pairs. `!`-exclusions must not be passed.
    pub fn build<'a>(patterns: impl IntoIterator<Item = (DecisionIndex, &'a str)>) -> Self {
        let mut trie = Self::new();
        for (decision, pattern) in patterns {
            trie.insert(pattern, decision);
        }
        trie
    }

    pub fn insert(&mut self, pattern: &str, decision: DecisionIndex) {
        let mut node = 0;
        for segment in segments(pattern) {
            match segment {
                Segment::Literal(s) => node = self.child_or_insert(node, s),
                Segment::Wildcard => {
                    self.nodes[node].wildcard_decisions.insert(decision);
                    self.patterns += 1;
                    return;
                }
                // `**` may match zero segments, so keep inserting the rest here.
                Segment::Globstar => {
                    self.nodes[node].wildcard_decisions.insert(decision);
                }
            }
        }
        self.nodes[node].decisions.insert(decision);
        self.patterns += 1;
    }

    fn child_or_insert(&mut self, node: usize, segment: &str) -> usize {
        if let Some(&child) = self.nodes[node].children.get(segment) {
            return child;
        }
        let child = self.nodes.len();
        self.nodes.push(TrieNode::default());
        self.nodes[node].children.insert(segment.to_string(), child);
        child
    }

    /// Decisions that may match `path` (a normalized, `/`-separated path).
    pub fn find_candidates(&self, path: &str) -> BTreeSet<DecisionIndex> {
        let mut out: BTreeSet<DecisionIndex> = self.nodes[0].wildcard_decisions.clone();
        let mut node = 0;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let Some(&child) = self.nodes[node].children.get(segment) else {
                return out;
            };
            node = child;
            out.extend(self.nodes[node].wildcard_decisions.iter().copied());
        }

        out.extend(self.nodes[node].decisions.iter().copied());
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns == 0
    }
}
