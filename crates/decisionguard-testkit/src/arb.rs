//! Proptest strategies for generating valid test inputs.
//!
//! Paths and globs are drawn from a small shared vocabulary so that random
//! globs actually match random paths often enough to exercise the engine.
//!
//! # Bounds
//!
//! - Max files per diff: 5
//! - Max hunks per file: 5
//! - Max lines per hunk: 20
//! - Max line length: 200 bytes
//! - Max glob segments: 4

use decisionguard_types::{Decision, DecisionStatus, MatchMode, RuleCondition, RuleGroup, Severity};
use proptest::prelude::*;

// =============================================================================
// Constants for bounding generated data
// =============================================================================

pub const MAX_FILES: usize = 5;

pub const MAX_HUNKS_PER_FILE: usize = 5;

pub const MAX_LINES_PER_HUNK: usize = 20;

pub const MAX_LINE_LENGTH: usize = 200;

pub const MAX_GLOB_SEGMENTS: usize = 4;

const DIRS: &[&str] = &["src", "lib", "auth", "config", "api", "a", "b", ".github"];
const EXTENSIONS: &[&str] = &["ts", "rs", "yml", "json", "md"];

// =============================================================================
// Enum Strategies
// =============================================================================

pub fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Info),
        Just(Severity::Warning),
        Just(Severity::Critical),
    ]
}

pub fn arb_match_mode() -> impl Strategy<Value = MatchMode> {
    prop_oneof![Just(MatchMode::Any), Just(MatchMode::All)]
}

// =============================================================================
// Paths and globs
// =============================================================================

pub fn arb_dir() -> impl Strategy<Value = &'static str> {
    prop::sample::select(DIRS)
}

pub fn arb_file_name() -> impl Strategy<Value = String> {
    (
        prop::string::string_regex("[a-c]{1,3}").expect("valid regex"),
        prop::sample::select(EXTENSIONS),
    )
        .prop_map(|(stem, ext)| format!("{stem}.{ext}"))
}

/// A normalized relative path: zero to three directories and a file name.
pub fn arb_path() -> impl Strategy<Value = String> {
    (prop::collection::vec(arb_dir(), 0..4), arb_file_name()).prop_map(|(dirs, file)| {
        let mut parts: Vec<String> = dirs.into_iter().map(str::to_string).collect();
        parts.push(file);
        parts.join("/")
    })
}

fn arb_glob_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => arb_dir().prop_map(str::to_string),
        2 => Just("**".to_string()),
        1 => Just("*".to_string()),
        1 => Just("{src,lib}".to_string()),
        1 => Just("[ab]".to_string()),
        1 => Just("?".to_string()),
    ]
}

fn arb_glob_file() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_file_name(),
        prop::sample::select(EXTENSIONS).prop_map(|ext| format!("*.{ext}")),
        Just("*".to_string()),
        Just("**".to_string()),
        Just("?.ts".to_string()),
        Just("{a,b}.rs".to_string()),
    ]
}

/// A syntactically valid glob over the same vocabulary as [`arb_path`].
pub fn arb_glob_pattern() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(arb_glob_segment(), 0..MAX_GLOB_SEGMENTS),
        arb_glob_file(),
    )
        .prop_map(|(dirs, file)| {
            let mut parts = dirs;
            parts.push(file);
            parts.join("/")
        })
}

// =============================================================================
// Rule trees and decisions
// =============================================================================

/// Path-only rule trees up to `depth` levels of nesting.
pub fn arb_rule_tree(depth: u32) -> impl Strategy<Value = RuleCondition> {
    let leaf = arb_glob_pattern().prop_map(RuleCondition::file);
    leaf.prop_recursive(depth, 32, 4, |inner| {
        (arb_match_mode(), prop::collection::vec(inner, 1..4)).prop_map(
            |(match_mode, conditions)| {
                RuleCondition::Group(RuleGroup {
                    match_mode,
                    conditions,
                })
            },
        )
    })
}

/// An active, path-only decision with one to three include globs.
pub fn arb_decision() -> impl Strategy<Value = Decision> {
    (
        0u32..1000,
        arb_severity(),
        prop::collection::vec(arb_glob_pattern(), 1..4),
    )
        .prop_map(|(n, severity, files)| decision(&format!("ADR-{n:03}"), severity, files))
}

/// An active decision with the given files and no rule tree.
pub fn decision(id: &str, severity: Severity, files: Vec<String>) -> Decision {
    Decision {
        id: id.to_string(),
        title: format!("Decision {id}"),
        date: "2024-01-01".to_string(),
        status: DecisionStatus::Active,
        severity,
        files,
        rules: None,
        context: String::new(),
        source_file: None,
        line_number: None,
    }
}
