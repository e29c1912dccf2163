//! Unified diff parsing.
//!
//! Two entry points:
//! - [`parse_patch`] reads the hunk text of a single file (the `patch` field of a
//!   [`decisionguard_types::FileDiff`]) into added lines with new-file line numbers.
//! - [`parse_unified_diff`] splits a full `git diff` into per-file `FileDiff`s.

mod patch;
mod unified;

pub use patch::{AddedLine, HunkHeader, PatchContent, PatchParseError, parse_hunk_header, parse_patch};
pub use unified::parse_unified_diff;
