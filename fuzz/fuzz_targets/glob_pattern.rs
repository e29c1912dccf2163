//! Fuzz target for glob compilation and the candidate trie.
//!
//! Any path the exact glob accepts must also come back from the trie.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use decisionguard_domain::{FilePatternSet, PatternTrie, normalize_path};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    pattern: String,
    paths: Vec<String>,
}

fuzz_target!(|input: FuzzInput| {
    if input.pattern.len() > 500 || input.paths.len() > 16 {
        return;
    }

    let files = vec![input.pattern.clone()];
    let Ok(set) = FilePatternSet::compile(&files) else {
        return;
    };

    let trie = PatternTrie::build(set.include_patterns().map(|p| (0, p)));
    for raw in &input.paths {
        let path = normalize_path(raw);
        if set.first_match(&path).is_some() {
            assert!(
                trie.find_candidates(&path).contains(&0),
                "trie dropped {path:?} for {:?}",
                input.pattern
            );
        }
    }
});
