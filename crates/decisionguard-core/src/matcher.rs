use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use decisionguard_domain::{
    ChangeSet, CompiledCondition, ContentMatcher, DecisionIndex, FileEvidence, FilePatternSet,
    PatternTrie, RegexCache, RegexLimits, RuleEvaluator, compile_condition,
};
use decisionguard_types::{
    Decision, DecisionMatch, DecisionWarning, EngineConfig, FileDiff, MatchDetails, MatchOutcome,
};

#[derive(Debug)]
struct CompiledDecision {
    decision: Arc<Decision>,
    files: FilePatternSet,
    rules: Option<CompiledCondition>,
}

impl CompiledDecision {
    fn has_content_rules(&self) -> bool {
        self.rules
            .as_ref()
            .is_some_and(CompiledCondition::has_content_rules)
    }

    fn warning(&self, message: impl Into<String>) -> DecisionWarning {
        DecisionWarning {
            decision_id: self.decision.id.clone(),
            message: message.into(),
        }
    }
}

/// A changed file selected by a decision's `files` list, and the include glob that selected it.
type PathHit = (String, String);

/// Matches changed files against a fixed set of decisions.
///
/// Built once per decision set: inactive decisions are filtered out,
/// globs and rule trees are compiled, and include patterns are indexed in a
/// [`PatternTrie`]. Decisions that fail to compile are dropped and reported
/// through [`FileMatcher::warnings`]; they never abort construction.
#[derive(Debug)]
pub struct FileMatcher {
    decisions: Vec<CompiledDecision>,
    trie: PatternTrie,
    /// Decisions with a rule tree but no include patterns.
    rule_only: Vec<DecisionIndex>,
    content: ContentMatcher,
    batch_size: usize,
    warnings: Vec<DecisionWarning>,
}

impl FileMatcher {
    pub fn new(decisions: &[Decision], config: EngineConfig) -> Self {
        let cache = Arc::new(RegexCache::new(
            config.regex_cache_capacity,
            config.regex_cache_evict_percent,
        ));
        Self::with_regex_cache(decisions, config, cache)
    }

    /// Like [`FileMatcher::new`], sharing a regex result cache with other matchers.
    pub fn with_regex_cache(
        decisions: &[Decision],
        config: EngineConfig,
        cache: Arc<RegexCache>,
    ) -> Self {
        let limits = RegexLimits::from(&config);
        let mut compiled = Vec::new();
        let mut warnings = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut inactive = 0usize;

        for decision in decisions {
            if !decision.is_active() {
                inactive += 1;
                continue;
            }
            if !seen_ids.insert(Decision::normalized_id(&decision.id)) {
                warn!("duplicate decision id {}; keeping the first", decision.id);
                warnings.push(DecisionWarning {
                    decision_id: decision.id.clone(),
                    message: "duplicate decision id; later definition ignored".to_string(),
                });
                continue;
            }
            match compile_decision(decision, &limits) {
                Ok(c) => compiled.push(c),
                Err(message) => {
                    warn!("decision {} dropped: {}", decision.id, message);
                    warnings.push(DecisionWarning {
                        decision_id: decision.id.clone(),
                        message,
                    });
                }
            }
        }

        let trie = PatternTrie::build(
            compiled
                .iter()
                .enumerate()
                .flat_map(|(i, d)| d.files.include_patterns().map(move |p| (i, p))),
        );
        let rule_only = compiled
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.files.has_includes())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        info!(
            "compiled {} active decision(s) ({} inactive, {} rejected); trie holds {} pattern(s) in {} node(s)",
            compiled.len(),
            inactive,
            warnings.len(),
            trie.pattern_count(),
            trie.node_count()
        );

        Self {
            decisions: compiled,
            trie,
            rule_only,
            content: ContentMatcher::with_cache(&config, cache),
            batch_size: config.batch_size.max(1),
            warnings,
        }
    }

    /// Problems found while compiling the decision set.
    pub fn warnings(&self) -> &[DecisionWarning] {
        &self.warnings
    }

    /// Number of active decisions that compiled successfully.
    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    pub fn find_matches_with_diffs(&self, diffs: &[FileDiff]) -> MatchOutcome {
        let changes = ChangeSet::from_diffs(diffs);
        self.run(&changes, false)
    }

    /// Path-only fallback for when diff content could not be retrieved.
    ///
    /// Decisions whose rule tree inspects content are skipped, never guessed.
    pub fn find_matches_by_path<S: AsRef<str>>(&self, paths: &[S]) -> MatchOutcome {
        let skipped = self
            .decisions
            .iter()
            .filter(|d| d.has_content_rules())
            .count();
        warn!(
            "matching on file paths only; {} decision(s) with content rules skipped",
            skipped
        );

        let changes = ChangeSet::from_paths(paths);
        let mut outcome = self.run(&changes, true);
        outcome.fallback = true;
        outcome
    }

    fn run(&self, changes: &ChangeSet, path_only: bool) -> MatchOutcome {
        let hits = self.path_hits(changes);

        let mut pending: BTreeSet<DecisionIndex> = hits.keys().copied().collect();
        pending.extend(self.rule_only.iter().copied());
        if path_only {
            pending.retain(|&i| !self.decisions[i].has_content_rules());
        }
        let pending: Vec<DecisionIndex> = pending.into_iter().collect();

        debug!(
            "{} file(s), {} decision(s) to evaluate in batches of {}",
            changes.len(),
            pending.len(),
            self.batch_size
        );

        let no_hits = Vec::new();
        let mut matches = BTreeMap::<(String, String), DecisionMatch>::new();
        let mut warnings = self.warnings.clone();

        for batch in pending.chunks(self.batch_size) {
            let results: Vec<Result<Vec<DecisionMatch>, DecisionWarning>> = batch
                .par_iter()
                .map(|&idx| {
                    let decision = &self.decisions[idx];
                    let hits = hits.get(&idx).unwrap_or(&no_hits);
                    catch_unwind(AssertUnwindSafe(|| {
                        self.evaluate_decision(decision, hits, changes)
                    }))
                    .unwrap_or_else(|payload| {
                        let text = panic_payload_to_string(payload.as_ref());
                        warn!("decision {} panicked during evaluation: {}", decision.decision.id, text);
                        Err(decision.warning(format!("evaluation panicked: {text}")))
                    })
                })
                .collect();

            for result in results {
                match result {
                    Ok(found) => {
                        for m in found {
                            matches
                                .entry((m.decision.id.clone(), m.file.clone()))
                                .or_insert(m);
                        }
                    }
                    Err(w) => warnings.push(w),
                }
            }
        }

        MatchOutcome {
            matches: matches.into_values().collect(),
            warnings,
            fallback: false,
        }
    }

    /// Trie lookup plus exact re-check, per file in parallel.
    fn path_hits(&self, changes: &ChangeSet) -> BTreeMap<DecisionIndex, Vec<PathHit>> {
        let per_file: Vec<Vec<(DecisionIndex, PathHit)>> = changes
            .files()
            .par_iter()
            .map(|file| {
                self.trie
                    .find_candidates(&file.path)
                    .into_iter()
                    .filter_map(|idx| {
                        self.decisions[idx]
                            .files
                            .first_match(&file.path)
                            .map(|pattern| (idx, (file.path.clone(), pattern.to_string())))
                    })
                    .collect()
            })
            .collect();

        let mut hits: BTreeMap<DecisionIndex, Vec<PathHit>> = BTreeMap::new();
        for (idx, hit) in per_file.into_iter().flatten() {
            hits.entry(idx).or_default().push(hit);
        }
        hits
    }

    fn evaluate_decision(
        &self,
        decision: &CompiledDecision,
        hits: &[PathHit],
        changes: &ChangeSet,
    ) -> Result<Vec<DecisionMatch>, DecisionWarning> {
        let Some(rules) = &decision.rules else {
            return Ok(hits
                .iter()
                .map(|(file, pattern)| DecisionMatch {
                    file: file.clone(),
                    decision: Arc::clone(&decision.decision),
                    matched_pattern: pattern.clone(),
                    match_details: None,
                })
                .collect());
        };

        let verdict = RuleEvaluator::new(&self.content)
            .evaluate(rules, changes)
            .map_err(|e| {
                warn!("decision {} rule evaluation failed: {}", decision.decision.id, e);
                decision.warning(e.to_string())
            })?;

        if !verdict.matched {
            return Ok(Vec::new());
        }

        // A file is reported only if it satisfied some leaf itself, and carries
        // only its own evidence.
        let reported: Vec<(PathHit, &FileEvidence)> = if decision.files.has_includes() {
            hits.iter()
                .filter_map(|hit| verdict.evidence_for(&hit.0).map(|e| (hit.clone(), e)))
                .collect()
        } else {
            verdict
                .files
                .iter()
                .filter(|(file, _)| !decision.files.is_excluded(file))
                .map(|(file, e)| ((file.clone(), e.pattern.clone()), e))
                .collect()
        };

        Ok(reported
            .into_iter()
            .map(|((file, pattern), evidence)| DecisionMatch {
                file,
                decision: Arc::clone(&decision.decision),
                matched_pattern: pattern,
                match_details: Some(MatchDetails {
                    matched_patterns: evidence.matched_patterns.iter().cloned().collect(),
                }),
            })
            .collect())
    }
}

fn compile_decision(
    decision: &Decision,
    limits: &RegexLimits,
) -> Result<CompiledDecision, String> {
    let files = FilePatternSet::compile(&decision.files).map_err(|e| e.to_string())?;
    let rules = decision
        .rules
        .as_ref()
        .map(|r| compile_condition(r, limits))
        .transpose()
        .map_err(|e| e.to_string())?;

    if !files.has_includes() && rules.is_none() {
        return Err("decision has no file patterns and no rule tree".to_string());
    }

    Ok(CompiledDecision {
        decision: Arc::new(decision.clone()),
        files,
        rules,
    })
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
