use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use decisionguard_types::{FileDiff, MAX_RULE_DEPTH, MatchMode};

use crate::change_set::{ChangeSet, ChangedFile};
use crate::compile::{CompiledCondition, CompiledFileRule};
use crate::content::{ContentError, ContentMatcher};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("rule tree nesting exceeds maximum depth of {max} (found depth {depth})")]
    DepthExceeded { depth: usize, max: usize },

    #[error("content rule failed on {file}: {source}")]
    Content {
        file: String,
        #[source]
        source: ContentError,
    },
}

/// Outcome of evaluating a rule tree, with the evidence that made it true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleVerdict {
    pub matched: bool,
    /// Bare globs for path-only leaves, content labels otherwise.
    pub matched_patterns: BTreeSet<String>,
    /// Each file that satisfied some leaf, with its own evidence.
    pub files: BTreeMap<String, FileEvidence>,
}

/// What one file contributed to a verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEvidence {
    /// First leaf pattern the file satisfied.
    pub pattern: String,
    /// Labels of the leaves this file satisfied, and nothing from other files.
    pub matched_patterns: BTreeSet<String>,
}

impl RuleVerdict {
    fn absorb(&mut self, other: RuleVerdict) {
        self.matched_patterns.extend(other.matched_patterns);
        for (file, evidence) in other.files {
            match self.files.get_mut(&file) {
                Some(existing) => existing.matched_patterns.extend(evidence.matched_patterns),
                None => {
                    self.files.insert(file, evidence);
                }
            }
        }
    }

    /// Evidence for `file`, if it satisfied any leaf.
    pub fn evidence_for(&self, file: &str) -> Option<&FileEvidence> {
        self.files.get(file)
    }
}

/// Evaluates compiled rule trees against a change set.
///
/// A file leaf holds when at least one file in the set is selected by its
/// glob, is not excluded, and satisfies all of its content rules. Handing
/// the evaluator a single-file set gives per-file semantics; handing it the
/// whole change set lets an `all` group span files.
#[derive(Debug, Clone, Copy)]
pub struct RuleEvaluator<'a> {
    content: &'a ContentMatcher,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(content: &'a ContentMatcher) -> Self {
        Self { content }
    }

    pub fn evaluate(
        &self,
        condition: &CompiledCondition,
        changes: &ChangeSet,
    ) -> Result<RuleVerdict, EvalError> {
        self.evaluate_at(condition, changes, 0)
    }

    /// Per-file form: does `condition` hold for this one diff?
    pub fn evaluate_file(
        &self,
        condition: &CompiledCondition,
        diff: &FileDiff,
    ) -> Result<RuleVerdict, EvalError> {
        self.evaluate(condition, &ChangeSet::single(diff))
    }

    pub fn evaluate_at(
        &self,
        condition: &CompiledCondition,
        changes: &ChangeSet,
        depth: usize,
    ) -> Result<RuleVerdict, EvalError> {
        if depth > MAX_RULE_DEPTH {
            return Err(EvalError::DepthExceeded {
                depth,
                max: MAX_RULE_DEPTH,
            });
        }

        match condition {
            CompiledCondition::File(rule) => self.evaluate_leaf(rule, changes),
            CompiledCondition::Group {
                mode: MatchMode::Any,
                conditions,
            } => {
                let mut verdict = RuleVerdict::default();
                for child in conditions {
                    let v = self.evaluate_at(child, changes, depth + 1)?;
                    if v.matched {
                        verdict.matched = true;
                        verdict.absorb(v);
                    }
                }
                Ok(verdict)
            }
            CompiledCondition::Group {
                mode: MatchMode::All,
                conditions,
            } => {
                let mut verdict = RuleVerdict {
                    matched: true,
                    ..RuleVerdict::default()
                };
                for child in conditions {
                    let v = self.evaluate_at(child, changes, depth + 1)?;
                    if !v.matched {
                        return Ok(RuleVerdict::default());
                    }
                    verdict.absorb(v);
                }
                Ok(verdict)
            }
        }
    }

    fn evaluate_leaf(
        &self,
        rule: &CompiledFileRule,
        changes: &ChangeSet,
    ) -> Result<RuleVerdict, EvalError> {
        let mut verdict = RuleVerdict::default();

        for file in changes.files() {
            if !rule.selects(&file.path) {
                continue;
            }
            let Some(labels) = self.content_labels(rule, file)? else {
                continue;
            };
            let labels: BTreeSet<String> = if labels.is_empty() {
                BTreeSet::from([rule.pattern.clone()])
            } else {
                labels.into_iter().collect()
            };
            verdict.matched_patterns.extend(labels.iter().cloned());
            let evidence = verdict
                .files
                .entry(file.path.clone())
                .or_insert_with(|| FileEvidence {
                    pattern: rule.pattern.clone(),
                    matched_patterns: BTreeSet::new(),
                });
            evidence.matched_patterns.extend(labels);
        }

        verdict.matched = !verdict.files.is_empty();
        Ok(verdict)
    }

    /// `None` when some content rule fails; otherwise the labels of every rule.
    fn content_labels(
        &self,
        rule: &CompiledFileRule,
        file: &ChangedFile,
    ) -> Result<Option<Vec<String>>, EvalError> {
        let mut labels = Vec::new();
        for content_rule in &rule.content_rules {
            let m = self
                .content
                .evaluate(content_rule, file)
                .map_err(|source| EvalError::Content {
                    file: file.path.clone(),
                    source,
                })?;
            if !m.matched {
                debug!(
                    "{} content rule did not match {} under {}",
                    content_rule.mode(),
                    file.path,
                    rule.pattern
                );
                return Ok(None);
            }
            labels.extend(m.matched_patterns);
        }
        Ok(Some(labels))
    }
}
