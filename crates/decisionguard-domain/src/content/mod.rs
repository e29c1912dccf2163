//! Content rules: decide whether a file's added lines satisfy a rule.

pub mod cache;
pub mod regex;

use std::sync::Arc;

use decisionguard_types::{ContentRule, EngineConfig};

use crate::change_set::ChangedFile;

use self::cache::RegexCache;
use self::regex::{RegexOutcome, RegexRejection, RegexSandbox};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("regex content rule '{pattern}' is unusable: {reason}")]
    Regex {
        pattern: String,
        reason: RegexRejection,
    },
}

/// Result of evaluating one content rule against one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMatch {
    pub matched: bool,
    /// Human-readable labels of what matched; empty when `matched` is false.
    pub matched_patterns: Vec<String>,
}

impl ContentMatch {
    fn miss() -> Self {
        Self::default()
    }

    fn hit(label: String) -> Self {
        Self {
            matched: true,
            matched_patterns: vec![label],
        }
    }
}

/// Evaluates [`ContentRule`]s against the added lines of a [`ChangedFile`].
///
/// Only lines added by the change are inspected. Removed lines and context
/// lines never satisfy a content rule.
#[derive(Debug)]
pub struct ContentMatcher {
    sandbox: RegexSandbox,
}

impl ContentMatcher {
    pub fn new(config: &EngineConfig) -> Self {
        let cache = Arc::new(RegexCache::new(
            config.regex_cache_capacity,
            config.regex_cache_evict_percent,
        ));
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: &EngineConfig, cache: Arc<RegexCache>) -> Self {
        Self {
            sandbox: RegexSandbox::new(config, cache),
        }
    }

    pub fn regex_cache(&self) -> &Arc<RegexCache> {
        self.sandbox.cache()
    }

    pub fn evaluate(
        &self,
        rule: &ContentRule,
        file: &ChangedFile,
    ) -> Result<ContentMatch, ContentError> {
        let result = match rule {
            ContentRule::Substring { patterns } => match_substring(patterns, file),
            ContentRule::Regex { pattern, flags } => {
                return self.match_regex(pattern, flags.as_deref().unwrap_or(""), file);
            }
            ContentRule::LineRange { start, end } => match_line_range(*start, *end, file),
            ContentRule::FullFile => ContentMatch::hit("full_file".to_string()),
            ContentRule::JsonPath { paths } => match_json_path(paths, file),
        };
        Ok(result)
    }

    fn match_regex(
        &self,
        pattern: &str,
        flags: &str,
        file: &ChangedFile,
    ) -> Result<ContentMatch, ContentError> {
        match self.sandbox.evaluate(pattern, flags, file.added_text()) {
            RegexOutcome::Matched => Ok(ContentMatch::hit(regex_label(pattern, flags))),
            RegexOutcome::NoMatch
            | RegexOutcome::TimedOut
            | RegexOutcome::ContentTooLarge { .. } => Ok(ContentMatch::miss()),
            RegexOutcome::Rejected(reason) => Err(ContentError::Regex {
                pattern: pattern.to_string(),
                reason,
            }),
        }
    }
}

pub(crate) fn regex_label(pattern: &str, flags: &str) -> String {
    format!("regex:/{pattern}/{flags}")
}

fn match_substring(patterns: &[String], file: &ChangedFile) -> ContentMatch {
    let labels: Vec<String> = patterns
        .iter()
        .filter(|p| !p.is_empty())
        .filter(|p| file.content.added.iter().any(|l| l.content.contains(p.as_str())))
        .map(|p| format!("string:{p}"))
        .collect();

    ContentMatch {
        matched: !labels.is_empty(),
        matched_patterns: labels,
    }
}

fn match_line_range(start: u32, end: u32, file: &ChangedFile) -> ContentMatch {
    let touched = file
        .content
        .added
        .iter()
        .any(|l| l.line >= start && l.line <= end);
    if touched {
        ContentMatch::hit(format!("line_range:{start}-{end}"))
    } else {
        ContentMatch::miss()
    }
}

/// Approximate JSON path check: the final key of each path must appear on an
/// added line. Quoting and nested structure are not verified, so YAML and TOML
/// keys match as well.
fn match_json_path(paths: &[String], file: &ChangedFile) -> ContentMatch {
    let labels: Vec<String> = paths
        .iter()
        .filter(|path| {
            json_path_last_key(path).is_some_and(|key| {
                file.content
                    .added
                    .iter()
                    .any(|l| l.content.contains(key.as_str()))
            })
        })
        .map(|p| format!("json_path:{p}"))
        .collect();

    ContentMatch {
        matched: !labels.is_empty(),
        matched_patterns: labels,
    }
}

/// Last property name in a JSONPath-like expression.
///
/// Handles `$.a.b`, `a.b`, `$['a']["b"]`; index and wildcard steps are skipped.
pub(crate) fn json_path_last_key(path: &str) -> Option<String> {
    let mut last: Option<String> = None;
    let mut rest = path.trim();

    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix('$') {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('.') {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('[') {
            let close = r.find(']')?;
            let inner = r[..close].trim();
            let unquoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
            if let Some(name) = unquoted {
                if !name.is_empty() {
                    last = Some(name.to_string());
                }
            }
            rest = &r[close + 1..];
        } else {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            let name = &rest[..end];
            if name != "*" && !name.is_empty() {
                last = Some(name.to_string());
            }
            rest = &rest[end..];
        }
    }

    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use decisionguard_types::FileDiff;

    fn file(patch: &str) -> ChangedFile {
        ChangedFile::from_diff(&FileDiff::with_patch("config/app.json", patch))
    }

    fn matcher() -> ContentMatcher {
        ContentMatcher::new(&EngineConfig::default())
    }

    const PATCH: &str = "\
@@ -10,3 +10,4 @@
 {
-  \"timeout\": 30,
+  \"timeout\": 60,
+  \"auth\": { \"provider\": \"oidc\" },
   \"name\": \"svc\"";

    #[test]
    fn substring_only_sees_added_lines() {
        let m = matcher();
        let f = file(PATCH);

        let hit = m
            .evaluate(
                &ContentRule::Substring {
                    patterns: vec!["oidc".into(), "missing".into()],
                },
                &f,
            )
            .unwrap();
        assert!(hit.matched);
        assert_eq!(hit.matched_patterns, vec!["string:oidc"]);

        // "30" only appears on a removed line, "svc" only in context.
        for needle in ["30", "svc"] {
            let miss = m
                .evaluate(
                    &ContentRule::Substring {
                        patterns: vec![needle.into()],
                    },
                    &f,
                )
                .unwrap();
            assert!(!miss.matched, "{needle}");
        }
    }

    #[test]
    fn line_range_is_inclusive_on_new_line_numbers() {
        let m = matcher();
        let f = file(PATCH);
        // Added lines are 11 and 12.
        let eval = |start, end| {
            m.evaluate(&ContentRule::LineRange { start, end }, &f)
                .unwrap()
                .matched
        };
        assert!(eval(12, 20));
        assert!(eval(1, 11));
        assert!(!eval(13, 40));
        assert!(!eval(1, 10));
    }

    #[test]
    fn full_file_always_matches() {
        let m = matcher();
        let f = ChangedFile::path_only("docs/adr/1.md");
        let r = m.evaluate(&ContentRule::FullFile, &f).unwrap();
        assert!(r.matched);
        assert_eq!(r.matched_patterns, vec!["full_file"]);
    }

    #[test]
    fn regex_matches_added_text() {
        let m = matcher();
        let f = file(PATCH);
        let r = m
            .evaluate(
                &ContentRule::Regex {
                    pattern: r#""timeout":\s*\d+"#.into(),
                    flags: None,
                },
                &f,
            )
            .unwrap();
        assert!(r.matched);
        assert_eq!(r.matched_patterns, vec![r#"regex:/"timeout":\s*\d+/"#]);
    }

    #[test]
    fn unsafe_regex_is_an_error() {
        let m = matcher();
        let err = m
            .evaluate(
                &ContentRule::Regex {
                    pattern: "(a+)+".into(),
                    flags: None,
                },
                &file(PATCH),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ContentError::Regex {
                reason: RegexRejection::CatastrophicBacktracking,
                ..
            }
        ));
    }

    #[test]
    fn json_path_looks_for_final_key() {
        let m = matcher();
        let f = file(PATCH);
        let r = m
            .evaluate(
                &ContentRule::JsonPath {
                    paths: vec!["$.auth.provider".into(), "$.database.host".into()],
                },
                &f,
            )
            .unwrap();
        assert!(r.matched);
        assert_eq!(r.matched_patterns, vec!["json_path:$.auth.provider"]);

        // "name" is only in a context line.
        let miss = m
            .evaluate(
                &ContentRule::JsonPath {
                    paths: vec!["$.name".into()],
                },
                &f,
            )
            .unwrap();
        assert!(!miss.matched);
    }

    #[test]
    fn json_path_matches_unquoted_keys() {
        let m = matcher();
        let yaml = ChangedFile::from_diff(&FileDiff::with_patch(
            "config/db.yml",
            "@@ -3,0 +4,1 @@\n+  pool_size: 20",
        ));
        let r = m
            .evaluate(
                &ContentRule::JsonPath {
                    paths: vec!["$.database.pool_size".into()],
                },
                &yaml,
            )
            .unwrap();
        assert!(r.matched);
        assert_eq!(r.matched_patterns, vec!["json_path:$.database.pool_size"]);
    }

    #[test]
    fn regex_timeout_is_a_miss_not_an_error() {
        let config = EngineConfig {
            regex_timeout_ms: 0,
            ..EngineConfig::default()
        };
        let m = ContentMatcher::new(&config);
        let lines: String = (0..4096).map(|_| format!("+{}\n", "ab".repeat(50))).collect();
        let f = file(&format!("@@ -0,0 +1,4096 @@\n{lines}"));

        let r = m
            .evaluate(
                &ContentRule::Regex {
                    pattern: r"b(?=c)".into(),
                    flags: None,
                },
                &f,
            )
            .unwrap();
        assert!(!r.matched);
        assert!(r.matched_patterns.is_empty());
        assert!(m.regex_cache().is_empty());
    }

    #[test]
    fn extracts_last_json_key() {
        assert_eq!(json_path_last_key("$.a.b").as_deref(), Some("b"));
        assert_eq!(json_path_last_key("a").as_deref(), Some("a"));
        assert_eq!(json_path_last_key("$['a'][\"b c\"]").as_deref(), Some("b c"));
        assert_eq!(json_path_last_key("$.items[0]").as_deref(), Some("items"));
        assert_eq!(json_path_last_key("$.items[*].id").as_deref(), Some("id"));
        assert_eq!(json_path_last_key("$.a.*").as_deref(), Some("a"));
        assert_eq!(json_path_last_key("$"), None);
        assert_eq!(json_path_last_key("$[unterminated"), None);
    }
}
