//! Fuzz target for rule-tree parsing, compilation and evaluation.

#![no_main]

use libfuzzer_sys::fuzz_target;

use decisionguard_domain::{
    ChangeSet, ContentMatcher, RegexLimits, RuleEvaluator, compile_condition, parse_rule_condition,
};
use decisionguard_types::{EngineConfig, FileDiff, MAX_RULE_DEPTH};

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(tree) = parse_rule_condition(&value) else {
        return;
    };
    assert!(tree.depth() <= MAX_RULE_DEPTH);

    let Ok(compiled) = compile_condition(&tree, &RegexLimits::default()) else {
        return;
    };

    let config = EngineConfig {
        regex_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let content = ContentMatcher::new(&config);
    let changes = ChangeSet::from_diffs(&[
        FileDiff::path_only("src/auth/login.ts"),
        FileDiff::with_patch("config/app.json", "@@ -0,0 +1,2 @@\n+{\n+  \"pool\": 5\n"),
    ]);
    let _ = RuleEvaluator::new(&content).evaluate(&compiled, &changes);
});
