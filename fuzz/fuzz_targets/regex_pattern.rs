//! Fuzz target for the regex gate and sandbox.
//!
//! Patterns that pass the static checks must compile and evaluate without
//! panicking; the sandbox must always return within its timeout.

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use decisionguard_domain::{RegexCache, RegexSandbox, check_pattern};
use decisionguard_types::EngineConfig;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    pattern: String,
    flags: String,
    content: String,
}

fuzz_target!(|input: FuzzInput| {
    if input.pattern.len() > 200 || input.content.len() > 4096 || input.flags.len() > 8 {
        return;
    }

    let config = EngineConfig {
        regex_timeout_ms: 50,
        ..EngineConfig::default()
    };
    if check_pattern(&input.pattern, &input.flags, config.max_regex_pattern_len).is_err() {
        return;
    }

    let sandbox = RegexSandbox::new(&config, Arc::new(RegexCache::new(16, 10)));
    let content: Arc<str> = Arc::from(input.content.as_str());
    let first = sandbox.evaluate(&input.pattern, &input.flags, &content);
    let second = sandbox.evaluate(&input.pattern, &input.flags, &content);
    if !matches!(first, decisionguard_domain::RegexOutcome::TimedOut) {
        assert_eq!(first.is_match(), second.is_match());
    }
});
