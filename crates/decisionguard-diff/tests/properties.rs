//! Property-based tests for decisionguard-diff
//!
//! Feature: decision-matching-engine

use proptest::prelude::*;

use decisionguard_diff::{parse_patch, parse_unified_diff};
use decisionguard_testkit::arb::arb_path;
use decisionguard_testkit::diff_builder::{DiffBuilder, FileBuilder, HunkBuilder};

#[derive(Debug, Clone)]
enum Op {
    Context(String),
    Add(String),
    Remove(String),
}

fn arb_line() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,40}").expect("valid regex")
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_line().prop_map(Op::Context),
        arb_line().prop_map(Op::Add),
        arb_line().prop_map(Op::Remove),
    ]
}

/// One to four non-overlapping hunks, each with one to ten lines.
fn arb_hunks() -> impl Strategy<Value = Vec<HunkBuilder>> {
    prop::collection::vec((0u32..20, prop::collection::vec(arb_op(), 1..10)), 1..4).prop_map(
        |specs| {
            let mut old_start = 1;
            let mut new_start = 1;
            let mut hunks = Vec::new();
            for (gap, ops) in specs {
                old_start += gap;
                new_start += gap;
                let mut hunk = HunkBuilder::new(old_start, new_start);
                for op in &ops {
                    hunk = match op {
                        Op::Context(s) => {
                            old_start += 1;
                            new_start += 1;
                            hunk.context(s)
                        }
                        Op::Add(s) => {
                            new_start += 1;
                            hunk.add_line(s)
                        }
                        Op::Remove(s) => {
                            old_start += 1;
                            hunk.remove(s)
                        }
                    };
                }
                hunks.push(hunk);
            }
            hunks
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Feature: decision-matching-engine, Property: added lines carry new-file numbers
    // Every added line is reported once, in order, with the line number the
    // hunk headers assign to it.
    #[test]
    fn property_added_line_numbers_follow_hunk_headers(hunks in arb_hunks()) {
        let expected: Vec<u32> = hunks.iter().flat_map(HunkBuilder::added_line_numbers).collect();
        let file = hunks
            .into_iter()
            .fold(FileBuilder::new("src/lib.rs"), FileBuilder::add_hunk);

        let parsed = parse_patch(&file.patch());
        let got: Vec<u32> = parsed.added_line_numbers().collect();

        prop_assert_eq!(got, expected);
        prop_assert_eq!(parsed.malformed_hunks, 0);
    }

    // Feature: decision-matching-engine, Property: removed and context lines are never added
    #[test]
    fn property_only_plus_lines_are_added(hunks in arb_hunks()) {
        let file = hunks
            .into_iter()
            .fold(FileBuilder::new("a.txt"), FileBuilder::add_hunk);
        let diff = file.to_file_diff();

        let parsed = parse_patch(diff.patch.as_deref().unwrap_or(""));
        prop_assert_eq!(parsed.added.len() as u32, diff.additions);
        prop_assert_eq!(parsed.removed, diff.deletions);
    }

    // Feature: decision-matching-engine, Property: whole-diff parsing keeps every file
    #[test]
    fn property_unified_diff_yields_one_entry_per_file(
        files in prop::collection::vec((arb_path(), arb_hunks()), 1..5),
    ) {
        let builder = files.iter().fold(DiffBuilder::new(), |b, (path, hunks)| {
            let file = hunks
                .iter()
                .cloned()
                .fold(FileBuilder::new(path), FileBuilder::add_hunk);
            b.add_file(file)
        });

        let parsed = parse_unified_diff(&builder.build());
        let expected = builder.file_diffs();

        prop_assert_eq!(parsed.len(), expected.len());
        for (got, want) in parsed.iter().zip(&expected) {
            prop_assert_eq!(&got.filename, &want.filename);
            prop_assert_eq!(got.additions, want.additions);
            prop_assert_eq!(got.deletions, want.deletions);
            prop_assert_eq!(&got.patch, &want.patch);
        }
    }
}
