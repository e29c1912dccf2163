use globset::{GlobMatcher, GlobSet, GlobSetBuilder};

use decisionguard_types::{
    ContentRule, EngineConfig, FileRule, MAX_REGEX_PATTERN_LEN, MAX_RULE_DEPTH, MatchMode,
    RuleCondition,
};

use crate::content::regex::{CompiledRegex, RegexRejection, check_pattern};
use crate::glob::{GlobError, compile_glob};
use crate::path::normalize_pattern;

#[derive(Debug, thiserror::Error)]
pub enum RuleCompileError {
    #[error("rule tree is not valid JSON for a rule condition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("rule tree nesting exceeds maximum depth of {max} (found depth {depth})")]
    DepthExceeded { depth: usize, max: usize },

    #[error("rule group at depth {depth} has no conditions")]
    EmptyGroup { depth: usize },

    #[error("file rule has an empty pattern")]
    EmptyPattern,

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("regex content rule '{pattern}' rejected: {reason}")]
    Regex {
        pattern: String,
        #[source]
        reason: RegexRejection,
    },

    #[error("line_range start {start} is after end {end}")]
    InvalidLineRange { start: u32, end: u32 },

    #[error("{mode} content rule lists no patterns")]
    EmptyContentRule { mode: &'static str },
}

/// Limits applied while compiling regex content rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegexLimits {
    pub max_pattern_len: usize,
}

impl Default for RegexLimits {
    fn default() -> Self {
        Self {
            max_pattern_len: MAX_REGEX_PATTERN_LEN,
        }
    }
}

impl From<&EngineConfig> for RegexLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_pattern_len: config.max_regex_pattern_len,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFileRule {
    /// Normalized glob, reported as evidence.
    pub pattern: String,
    pub matcher: GlobMatcher,
    pub exclude: Option<GlobSet>,
    pub content_rules: Vec<ContentRule>,
}

impl CompiledFileRule {
    pub fn selects(&self, path: &str) -> bool {
        self.matcher.is_match(path) && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(path))
    }
}

/// A validated rule tree with its globs compiled.
#[derive(Debug, Clone)]
pub enum CompiledCondition {
    File(CompiledFileRule),
    Group {
        mode: MatchMode,
        conditions: Vec<CompiledCondition>,
    },
}

impl CompiledCondition {
    pub fn has_content_rules(&self) -> bool {
        match self {
            CompiledCondition::File(f) => !f.content_rules.is_empty(),
            CompiledCondition::Group { conditions, .. } => {
                conditions.iter().any(CompiledCondition::has_content_rules)
            }
        }
    }
}

/// Parse a rule tree from its JSON wire shape.
///
/// Shape errors (mixed nodes, missing patterns, nesting past the limit) are
/// caught here; semantic checks are left to [`validate_rule_condition`].
pub fn parse_rule_condition(value: &serde_json::Value) -> Result<RuleCondition, RuleCompileError> {
    Ok(serde_json::from_value(value.clone())?)
}

pub fn validate_rule_condition(
    condition: &RuleCondition,
    limits: &RegexLimits,
) -> Result<(), RuleCompileError> {
    compile_condition(condition, limits).map(|_| ())
}

pub fn compile_condition(
    condition: &RuleCondition,
    limits: &RegexLimits,
) -> Result<CompiledCondition, RuleCompileError> {
    compile_at(condition, limits, 0)
}

fn compile_at(
    condition: &RuleCondition,
    limits: &RegexLimits,
    depth: usize,
) -> Result<CompiledCondition, RuleCompileError> {
    if depth > MAX_RULE_DEPTH {
        return Err(RuleCompileError::DepthExceeded {
            depth,
            max: MAX_RULE_DEPTH,
        });
    }

    match condition {
        RuleCondition::File(rule) => compile_file_rule(rule, limits).map(CompiledCondition::File),
        RuleCondition::Group(group) => {
            if group.conditions.is_empty() {
                return Err(RuleCompileError::EmptyGroup { depth });
            }
            let conditions = group
                .conditions
                .iter()
                .map(|c| compile_at(c, limits, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledCondition::Group {
                mode: group.match_mode,
                conditions,
            })
        }
    }
}

fn compile_file_rule(
    rule: &FileRule,
    limits: &RegexLimits,
) -> Result<CompiledFileRule, RuleCompileError> {
    let pattern = normalize_pattern(&rule.pattern);
    if pattern.is_empty() {
        return Err(RuleCompileError::EmptyPattern);
    }
    let matcher = compile_glob(&pattern)?;
    let exclude = compile_excludes(&rule.exclude)?;

    for content_rule in &rule.content_rules {
        check_content_rule(content_rule, limits)?;
    }

    Ok(CompiledFileRule {
        pattern,
        matcher,
        exclude,
        content_rules: rule.content_rules.clone(),
    })
}

fn compile_excludes(globs: &[String]) -> Result<Option<GlobSet>, RuleCompileError> {
    if globs.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for g in globs {
        let normalized = normalize_pattern(g);
        builder.add(compile_glob(&normalized)?.glob().clone());
    }

    let set = builder.build().map_err(|source| GlobError::Invalid {
        glob: globs.join(", "),
        source,
    })?;
    Ok(Some(set))
}

fn check_content_rule(rule: &ContentRule, limits: &RegexLimits) -> Result<(), RuleCompileError> {
    match rule {
        ContentRule::Substring { patterns } | ContentRule::JsonPath { paths: patterns } => {
            if patterns.iter().all(|p| p.is_empty()) {
                return Err(RuleCompileError::EmptyContentRule { mode: rule.mode() });
            }
        }
        ContentRule::Regex { pattern, flags } => {
            let flags = flags.as_deref().unwrap_or("");
            let regex_err = |reason| RuleCompileError::Regex {
                pattern: pattern.clone(),
                reason,
            };
            check_pattern(pattern, flags, limits.max_pattern_len).map_err(regex_err)?;
            CompiledRegex::new(pattern, flags).map_err(regex_err)?;
        }
        ContentRule::LineRange { start, end } => {
            if start > end {
                return Err(RuleCompileError::InvalidLineRange {
                    start: *start,
                    end: *end,
                });
            }
        }
        ContentRule::FullFile => {}
    }
    Ok(())
}
