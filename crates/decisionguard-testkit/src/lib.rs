//! Shared test utilities for the decisionguard workspace.
//!
//! This crate provides:
//! - **arb**: Proptest strategies for paths, globs, rule trees and decisions
//! - **diff_builder**: Builders for hunk text and full `git diff` output
//! - **fixtures**: Sample decisions and diffs used across crates
//!
//! # Example
//!
//! ```rust,ignore
//! use decisionguard_testkit::arb;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     fn trie_is_sound(path in arb::arb_path()) {
//!         assert!(!path.is_empty());
//!     }
//! }
//! ```

pub mod arb;
pub mod diff_builder;
pub mod fixtures;

pub use arb::{arb_decision, arb_glob_pattern, arb_path, arb_rule_tree, arb_severity};
pub use diff_builder::{DiffBuilder, FileBuilder, HunkBuilder};
pub use fixtures::{sample_decisions, sample_diffs};
