//! Property-based tests for decisionguard-core
//!
//! Feature: decision-matching-engine

use proptest::prelude::*;

use decisionguard_core::{FileMatcher, group_by_severity, match_fingerprint};
use decisionguard_domain::{FilePatternSet, normalize_path};
use decisionguard_testkit::arb::{arb_decision, arb_path};
use decisionguard_testkit::fixtures::sample_decisions;
use decisionguard_testkit::diff_builder::{FileBuilder, HunkBuilder};
use decisionguard_types::{Decision, EngineConfig, FileDiff};

fn with_batch_size(batch_size: usize) -> EngineConfig {
    EngineConfig {
        batch_size,
        ..EngineConfig::default()
    }
}

/// Unique ids so duplicate-id handling does not mask results.
fn renumber(mut decisions: Vec<Decision>) -> Vec<Decision> {
    for (i, d) in decisions.iter_mut().enumerate() {
        d.id = format!("ADR-{i:03}");
    }
    decisions
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // Feature: decision-matching-engine, Property: idempotence across batch sizes
    // The result set does not depend on batching or on repeated runs.
    #[test]
    fn property_results_do_not_depend_on_batch_size(
        decisions in prop::collection::vec(arb_decision(), 1..12),
        paths in prop::collection::vec(arb_path(), 1..8),
        batch_size in 1usize..8,
    ) {
        let decisions = renumber(decisions);
        let diffs: Vec<FileDiff> = paths.iter().map(FileDiff::path_only).collect();

        let reference = FileMatcher::new(&decisions, with_batch_size(50)).find_matches_with_diffs(&diffs);
        let batched = FileMatcher::new(&decisions, with_batch_size(batch_size));

        prop_assert_eq!(&batched.find_matches_with_diffs(&diffs), &reference);
        prop_assert_eq!(&batched.find_matches_with_diffs(&diffs), &reference);
    }

    // Feature: decision-matching-engine, Property: trie pre-filter is invisible
    // A match is reported exactly when the decision's own files list selects the path.
    #[test]
    fn property_matches_equal_exact_glob_semantics(
        decisions in prop::collection::vec(arb_decision(), 1..8),
        paths in prop::collection::vec(arb_path(), 1..6),
    ) {
        let decisions = renumber(decisions);
        let diffs: Vec<FileDiff> = paths.iter().map(FileDiff::path_only).collect();
        let outcome = FileMatcher::new(&decisions, EngineConfig::default()).find_matches_with_diffs(&diffs);

        let mut expected = Vec::new();
        for d in &decisions {
            let set = FilePatternSet::compile(&d.files).expect("valid globs");
            for p in &paths {
                let p = normalize_path(p);
                if set.first_match(&p).is_some() {
                    expected.push((d.id.clone(), p));
                }
            }
        }
        expected.sort();
        expected.dedup();

        let got: Vec<(String, String)> = outcome
            .matches
            .iter()
            .map(|m| (m.decision.id.clone(), m.file.clone()))
            .collect();
        prop_assert_eq!(got, expected);
    }

    // Feature: decision-matching-engine, Property: severity grouping is a partition
    #[test]
    fn property_grouping_keeps_every_match(
        decisions in prop::collection::vec(arb_decision(), 1..8),
        paths in prop::collection::vec(arb_path(), 1..6),
    ) {
        let decisions = renumber(decisions);
        let diffs: Vec<FileDiff> = paths.iter().map(FileDiff::path_only).collect();
        let outcome = FileMatcher::new(&decisions, EngineConfig::default()).find_matches_with_diffs(&diffs);

        let groups = group_by_severity(&outcome.matches);
        prop_assert_eq!(groups.len(), outcome.matches.len());

        let mut fingerprints: Vec<String> = outcome.matches.iter().map(match_fingerprint).collect();
        fingerprints.sort();
        fingerprints.dedup();
        prop_assert_eq!(fingerprints.len(), outcome.matches.len());
    }
}

// Scenario: glob `src/**/*.ts` against `src/a/b.ts`.
#[test]
fn scenario_globstar_typescript_match() {
    let m = FileMatcher::new(&[sample_decisions::typescript_sources()], EngineConfig::default());
    let out = m.find_matches_with_diffs(&[FileDiff::path_only("src/a/b.ts")]);
    assert_eq!(out.matches.len(), 1);
    assert_eq!(out.matches[0].file, "src/a/b.ts");
    assert_eq!(out.matches[0].matched_pattern, "src/**/*.ts");
}

// Scenario: all[config/auth.yml, any[src/auth/**/*.ts, src/middleware/auth.ts]].
#[test]
fn scenario_cross_file_all_tree() {
    let m = FileMatcher::new(&[sample_decisions::auth_boundary()], EngineConfig::default());
    let config = FileDiff::path_only("config/auth.yml");
    let login = FileDiff::path_only("src/auth/login.ts");

    assert!(m.find_matches_with_diffs(&[config.clone()]).matches.is_empty());
    assert!(!m.find_matches_with_diffs(&[config, login]).matches.is_empty());
}

// Scenario: line_range 1..10 against added lines 42 and 5.
#[test]
fn scenario_line_range() {
    let m = FileMatcher::new(&[sample_decisions::config_header()], EngineConfig::default());
    let at = |line| {
        FileBuilder::new("config/app.json")
            .add_hunk(HunkBuilder::additions_at(line, &["\"pool\": 5"]))
            .to_file_diff()
    };

    assert!(m.find_matches_with_diffs(&[at(42)]).matches.is_empty());
    assert_eq!(m.find_matches_with_diffs(&[at(5)]).matches.len(), 1);
}

// Scenario: `(a+)+` is rejected up front; the decision never runs.
#[test]
fn scenario_catastrophic_regex_rejected_at_construction() {
    let d: Decision = serde_json::from_value(serde_json::json!({
        "id": "ADR-500",
        "title": "No ReDoS",
        "severity": "critical",
        "files": ["src/**"],
        "rules": {
            "type": "file",
            "pattern": "src/**",
            "content_rules": [{ "mode": "regex", "pattern": "(a+)+" }]
        }
    }))
    .unwrap();

    let m = FileMatcher::new(&[d], EngineConfig::default());
    assert_eq!(m.decision_count(), 0);
    assert_eq!(m.warnings().len(), 1);
    assert!(m.warnings()[0].message.contains("backtrack"));
}
