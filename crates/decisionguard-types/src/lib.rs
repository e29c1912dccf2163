//! Data types (decisions, rule trees, diffs, matches) for decisionguard.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars. The
//! only logic here is shape conversion for the rule-tree wire format, so that
//! malformed or over-nested trees are rejected while a decision is parsed.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Engine Limits ──────────────────────────────────────────────
/// Deepest allowed rule-tree nesting (root is depth 0, inclusive).
pub const MAX_RULE_DEPTH: usize = 10;
pub const MAX_REGEX_PATTERN_LEN: usize = 1000;
/// Largest content body a regex is executed against (1 MiB).
pub const MAX_CONTENT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_REGEX_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_REGEX_CACHE_CAPACITY: usize = 500;
pub const DEFAULT_REGEX_CACHE_EVICT_PERCENT: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    #[default]
    Active,
    Deprecated,
    Superseded,
    Archived,
}

impl DecisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStatus::Active => "active",
            DecisionStatus::Deprecated => "deprecated",
            DecisionStatus::Superseded => "superseded",
            DecisionStatus::Archived => "archived",
        }
    }
}

/// A single declared architectural decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: DecisionStatus,
    pub severity: Severity,
    /// Glob patterns; entries starting with `!` are exclusions.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleCondition>,
    #[serde(default)]
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl Decision {
    /// Canonical form of a decision id: trimmed and ASCII-uppercased.
    pub fn normalized_id(raw: &str) -> String {
        raw.trim().to_ascii_uppercase()
    }

    pub fn is_active(&self) -> bool {
        self.status == DecisionStatus::Active
    }

    /// True if any leaf of the rule tree inspects diff content.
    pub fn has_content_rules(&self) -> bool {
        self.rules
            .as_ref()
            .is_some_and(RuleCondition::has_content_rules)
    }
}

// ── Rule Trees ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Any,
    All,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::Any => "any",
            MatchMode::All => "all",
        }
    }
}

/// A node of a decision's rule tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRuleCondition", into = "RawRuleCondition")]
pub enum RuleCondition {
    File(FileRule),
    Group(RuleGroup),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGroup {
    pub match_mode: MatchMode,
    pub conditions: Vec<RuleCondition>,
}

/// Leaf predicate: path glob, optional exclusions, optional content checks.
///
/// `content_rules` are implicitly AND-ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRule {
    pub pattern: String,
    pub exclude: Vec<String>,
    pub content_rules: Vec<ContentRule>,
}

impl FileRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            exclude: Vec::new(),
            content_rules: Vec::new(),
        }
    }
}

impl RuleCondition {
    pub fn file(pattern: impl Into<String>) -> Self {
        RuleCondition::File(FileRule::new(pattern))
    }

    pub fn any(conditions: Vec<RuleCondition>) -> Self {
        RuleCondition::Group(RuleGroup {
            match_mode: MatchMode::Any,
            conditions,
        })
    }

    pub fn all(conditions: Vec<RuleCondition>) -> Self {
        RuleCondition::Group(RuleGroup {
            match_mode: MatchMode::All,
            conditions,
        })
    }

    /// Nesting depth of the tree; a lone leaf has depth 0.
    pub fn depth(&self) -> usize {
        match self {
            RuleCondition::File(_) => 0,
            RuleCondition::Group(g) => g
                .conditions
                .iter()
                .map(|c| c.depth() + 1)
                .max()
                .unwrap_or(0),
        }
    }

    pub fn has_content_rules(&self) -> bool {
        match self {
            RuleCondition::File(f) => !f.content_rules.is_empty(),
            RuleCondition::Group(g) => g.conditions.iter().any(RuleCondition::has_content_rules),
        }
    }

    /// All leaves in depth-first order.
    pub fn file_rules(&self) -> Vec<&FileRule> {
        let mut out = Vec::new();
        collect_file_rules(self, &mut out);
        out
    }
}

fn collect_file_rules<'a>(node: &'a RuleCondition, out: &mut Vec<&'a FileRule>) {
    match node {
        RuleCondition::File(f) => out.push(f),
        RuleCondition::Group(g) => {
            for c in &g.conditions {
                collect_file_rules(c, out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleShapeError {
    #[error("rule tree nesting exceeds maximum depth of {max} (found depth {depth})")]
    DepthExceeded { depth: usize, max: usize },

    #[error("rule condition has neither `conditions` nor `pattern`")]
    MissingPattern,

    #[error("rule condition mixes `conditions`/`match_mode` with file-rule fields")]
    MixedNode,
}

/// Content-level predicate evaluated against a file's diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ContentRule {
    #[serde(rename = "string")]
    Substring { patterns: Vec<String> },
    Regex {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flags: Option<String>,
    },
    LineRange { start: u32, end: u32 },
    FullFile,
    JsonPath { paths: Vec<String> },
}

impl ContentRule {
    pub fn mode(&self) -> &'static str {
        match self {
            ContentRule::Substring { .. } => "string",
            ContentRule::Regex { .. } => "regex",
            ContentRule::LineRange { .. } => "line_range",
            ContentRule::FullFile => "full_file",
            ContentRule::JsonPath { .. } => "json_path",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    File,
}

/// `exclude` accepts a single glob or a list of globs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Wire shape of a rule-tree node, exactly as written in decision files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(rename = "RuleCondition")]
pub struct RawRuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_mode: Option<MatchMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<RawRuleCondition>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuleKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_rules: Option<Vec<ContentRule>>,
}

impl TryFrom<RawRuleCondition> for RuleCondition {
    type Error = RuleShapeError;

    fn try_from(raw: RawRuleCondition) -> Result<Self, Self::Error> {
        convert_raw(raw, 0)
    }
}

fn convert_raw(raw: RawRuleCondition, depth: usize) -> Result<RuleCondition, RuleShapeError> {
    if depth > MAX_RULE_DEPTH {
        return Err(RuleShapeError::DepthExceeded {
            depth,
            max: MAX_RULE_DEPTH,
        });
    }

    let has_file_fields = raw.kind.is_some()
        || raw.pattern.is_some()
        || raw.exclude.is_some()
        || raw.content_rules.is_some();

    match raw.conditions {
        Some(children) => {
            if has_file_fields {
                return Err(RuleShapeError::MixedNode);
            }
            let conditions = children
                .into_iter()
                .map(|c| convert_raw(c, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RuleCondition::Group(RuleGroup {
                match_mode: raw.match_mode.unwrap_or_default(),
                conditions,
            }))
        }
        None => {
            if raw.match_mode.is_some() {
                return Err(RuleShapeError::MixedNode);
            }
            let Some(pattern) = raw.pattern else {
                return Err(RuleShapeError::MissingPattern);
            };
            Ok(RuleCondition::File(FileRule {
                pattern,
                exclude: raw.exclude.map(OneOrMany::into_vec).unwrap_or_default(),
                content_rules: raw.content_rules.unwrap_or_default(),
            }))
        }
    }
}

impl From<RuleCondition> for RawRuleCondition {
    fn from(node: RuleCondition) -> Self {
        match node {
            RuleCondition::File(f) => RawRuleCondition {
                kind: Some(RuleKind::File),
                pattern: Some(f.pattern),
                exclude: match f.exclude.len() {
                    0 => None,
                    1 => f.exclude.into_iter().next().map(OneOrMany::One),
                    _ => Some(OneOrMany::Many(f.exclude)),
                },
                content_rules: if f.content_rules.is_empty() {
                    None
                } else {
                    Some(f.content_rules)
                },
                ..RawRuleCondition::default()
            },
            RuleCondition::Group(g) => RawRuleCondition {
                match_mode: Some(g.match_mode),
                conditions: Some(g.conditions.into_iter().map(Into::into).collect()),
                ..RawRuleCondition::default()
            },
        }
    }
}

impl JsonSchema for RuleCondition {
    fn schema_name() -> String {
        "RuleCondition".to_string()
    }

    fn json_schema(generator: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <RawRuleCondition as JsonSchema>::json_schema(generator)
    }
}

// ── Diffs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Removed,
    #[default]
    Modified,
    Renamed,
    Copied,
    Changed,
    Unchanged,
}

/// One changed file as delivered by the source-control collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileDiff {
    pub filename: String,
    #[serde(default)]
    pub status: FileStatus,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub changes: u32,
    /// Unified-diff hunk text. Absent for binary or oversized files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_filename: Option<String>,
}

impl FileDiff {
    /// A path-only diff with no patch content.
    pub fn path_only(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Modified,
            additions: 0,
            deletions: 0,
            changes: 0,
            patch: None,
            previous_filename: None,
        }
    }

    pub fn with_patch(filename: impl Into<String>, patch: impl Into<String>) -> Self {
        Self {
            patch: Some(patch.into()),
            ..Self::path_only(filename)
        }
    }
}

// ── Matches ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    /// Content-level predicates that fired, sorted and deduplicated.
    pub matched_patterns: Vec<String>,
}

/// A verified association of one changed file with one active decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMatch {
    pub file: String,
    pub decision: Arc<Decision>,
    pub matched_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_details: Option<MatchDetails>,
}

/// A problem with one decision that did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionWarning {
    pub decision_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MatchOutcome {
    pub matches: Vec<DecisionMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DecisionWarning>,
    /// Set when matching ran on paths alone because diff content was unavailable.
    #[serde(default, skip_serializing_if = "is_false")]
    pub fallback: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SeverityGroups {
    pub critical: Vec<DecisionMatch>,
    pub warning: Vec<DecisionMatch>,
    pub info: Vec<DecisionMatch>,
}

impl SeverityGroups {
    pub fn len(&self) -> usize {
        self.critical.len() + self.warning.len() + self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Configuration ──────────────────────────────────────────────

/// Tunables for the matching engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub regex_timeout_ms: u64,
    pub max_content_bytes: usize,
    pub max_regex_pattern_len: usize,
    pub regex_cache_capacity: usize,
    pub regex_cache_evict_percent: usize,
    /// Decisions evaluated per parallel batch.
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            regex_timeout_ms: DEFAULT_REGEX_TIMEOUT_MS,
            max_content_bytes: MAX_CONTENT_BYTES,
            max_regex_pattern_len: MAX_REGEX_PATTERN_LEN,
            regex_cache_capacity: DEFAULT_REGEX_CACHE_CAPACITY,
            regex_cache_evict_percent: DEFAULT_REGEX_CACHE_EVICT_PERCENT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// The on-disk `decisionguard.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
}

/// A file of pre-parsed decisions (`{"decisions": [...]}` / `[[decisions]]`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DecisionFile {
    #[serde(default)]
    pub decisions: Vec<Decision>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(depth: usize) -> serde_json::Value {
        let mut node = serde_json::json!({ "type": "file", "pattern": "a.txt" });
        for _ in 0..depth {
            node = serde_json::json!({ "match_mode": "all", "conditions": [node] });
        }
        node
    }

    #[test]
    fn parses_leaf_with_single_exclude() {
        let rule: RuleCondition = serde_json::from_value(serde_json::json!({
            "type": "file",
            "pattern": "src/**/*.ts",
            "exclude": "src/**/*.test.ts",
            "content_rules": [{ "mode": "full_file" }]
        }))
        .unwrap();

        let RuleCondition::File(f) = rule else {
            panic!("expected leaf");
        };
        assert_eq!(f.exclude, vec!["src/**/*.test.ts".to_string()]);
        assert_eq!(f.content_rules, vec![ContentRule::FullFile]);
    }

    #[test]
    fn group_defaults_to_any() {
        let rule: RuleCondition = serde_json::from_value(serde_json::json!({
            "conditions": [{ "pattern": "a" }, { "pattern": "b" }]
        }))
        .unwrap();

        match rule {
            RuleCondition::Group(g) => {
                assert_eq!(g.match_mode, MatchMode::Any);
                assert_eq!(g.conditions.len(), 2);
            }
            RuleCondition::File(_) => panic!("expected group"),
        }
    }

    #[test]
    fn depth_ten_is_accepted_and_eleven_rejected() {
        let ok: RuleCondition = serde_json::from_value(nested(MAX_RULE_DEPTH)).unwrap();
        assert_eq!(ok.depth(), MAX_RULE_DEPTH);

        let err = serde_json::from_value::<RuleCondition>(nested(MAX_RULE_DEPTH + 1))
            .unwrap_err()
            .to_string();
        assert!(err.contains("maximum depth"), "{err}");
    }

    #[test]
    fn rejects_node_without_pattern_or_conditions() {
        let err = serde_json::from_value::<RuleCondition>(serde_json::json!({ "type": "file" }))
            .unwrap_err()
            .to_string();
        assert!(err.contains("neither"), "{err}");
    }

    #[test]
    fn rejects_mixed_node() {
        let err = serde_json::from_value::<RuleCondition>(serde_json::json!({
            "pattern": "a",
            "conditions": [{ "pattern": "b" }]
        }))
        .unwrap_err()
        .to_string();
        assert!(err.contains("mixes"), "{err}");
    }

    #[test]
    fn content_rules_use_mode_tag() {
        let rules: Vec<ContentRule> = serde_json::from_value(serde_json::json!([
            { "mode": "string", "patterns": ["TODO"] },
            { "mode": "regex", "pattern": "a+", "flags": "i" },
            { "mode": "line_range", "start": 1, "end": 10 },
            { "mode": "full_file" },
            { "mode": "json_path", "paths": ["$.database.pool_size"] }
        ]))
        .unwrap();

        let modes: Vec<_> = rules.iter().map(ContentRule::mode).collect();
        assert_eq!(
            modes,
            vec!["string", "regex", "line_range", "full_file", "json_path"]
        );
    }

    #[test]
    fn rule_tree_serializes_back_to_wire_shape() {
        let tree = RuleCondition::all(vec![
            RuleCondition::file("config/auth.yml"),
            RuleCondition::any(vec![RuleCondition::file("src/auth/**/*.ts")]),
        ]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["match_mode"], "all");
        assert_eq!(json["conditions"][0]["type"], "file");
        assert_eq!(json["conditions"][0]["pattern"], "config/auth.yml");
        assert!(json["conditions"][0].get("exclude").is_none());

        let back: RuleCondition = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn decision_uses_camel_case_provenance() {
        let d: Decision = serde_json::from_value(serde_json::json!({
            "id": "ADR-001",
            "title": "Auth lives in one place",
            "severity": "critical",
            "files": ["src/auth/**"],
            "sourceFile": "docs/decisions.md",
            "lineNumber": 12
        }))
        .unwrap();

        assert!(d.is_active());
        assert_eq!(d.source_file.as_deref(), Some("docs/decisions.md"));
        assert_eq!(d.line_number, Some(12));
        assert!(!d.has_content_rules());
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn engine_config_fills_defaults_from_partial_toml() {
        let cfg: ConfigFile = toml::from_str("[engine]\nbatch_size = 8\n").unwrap();
        assert_eq!(cfg.engine.batch_size, 8);
        assert_eq!(cfg.engine.regex_timeout_ms, DEFAULT_REGEX_TIMEOUT_MS);
        assert_eq!(cfg.engine.max_content_bytes, MAX_CONTENT_BYTES);
    }

    #[test]
    fn normalized_id_is_trimmed_uppercase() {
        assert_eq!(Decision::normalized_id("  adr-007 "), "ADR-007");
    }
}
