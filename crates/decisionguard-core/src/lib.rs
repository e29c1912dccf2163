//! Core engine: matches changed files against decisions and renders reports.

mod fingerprint;
mod matcher;
mod report;

pub use fingerprint::match_fingerprint;
pub use matcher::FileMatcher;
pub use report::{FailOn, group_by_severity, render_json, render_markdown};
