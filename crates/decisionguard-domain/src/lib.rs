//! Domain logic: glob compilation, candidate indexing, content matching and
//! rule-tree evaluation.
//!
//! This crate is designed to be I/O-free and highly testable.

pub mod change_set;
pub mod compile;
pub mod content;
pub mod evaluate;
pub mod glob;
pub mod path;
pub mod trie;

pub use change_set::{ChangeSet, ChangedFile};
pub use compile::{
    CompiledCondition, CompiledFileRule, RegexLimits, RuleCompileError, compile_condition,
    parse_rule_condition, validate_rule_condition,
};
pub use content::cache::RegexCache;
pub use content::regex::{
    CompiledRegex, RegexOutcome, RegexRejection, RegexSandbox, check_pattern,
    has_catastrophic_backtracking, needs_backtracking_engine,
};
pub use content::{ContentError, ContentMatch, ContentMatcher};
pub use evaluate::{EvalError, FileEvidence, RuleEvaluator, RuleVerdict};
pub use glob::{FilePatternSet, GlobError, Segment, compile_glob, segments};
pub use path::{normalize_path, normalize_pattern};
pub use trie::{DecisionIndex, PatternTrie};
