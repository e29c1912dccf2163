//! Glob compilation.
//!
//! A glob is used two ways: as an exact matcher (globset, `*` does not cross
//! `/`) and as a list of [`Segment`]s for insertion into the
//! [`PatternTrie`](crate::trie::PatternTrie).

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::path::normalize_pattern;

/// Characters that make a segment non-literal for trie purposes. Backslash is
/// included because an escaped character never compares equal to its
/// pattern text.
const SEGMENT_META: &[char] = &['*', '?', '{', '}', '[', ']', '\\'];

#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("empty glob pattern")]
    Empty,

    #[error("invalid glob '{glob}': {source}")]
    Invalid {
        glob: String,
        source: globset::Error,
    },
}

/// One `/`-separated piece of a glob pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// Any segment containing glob metacharacters other than a bare `**`.
    Wildcard,
    Globstar,
}

/// Split a (normalized) glob into trie segments. Empty segments are dropped.
pub fn segments(pattern: &str) -> Vec<Segment<'_>> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s == "**" {
                Segment::Globstar
            } else if s.contains(SEGMENT_META) {
                Segment::Wildcard
            } else {
                Segment::Literal(s)
            }
        })
        .collect()
}

/// Compile a single glob (without a `!` prefix) into an exact matcher.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, GlobError> {
    if pattern.is_empty() {
        return Err(GlobError::Empty);
    }
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|source| GlobError::Invalid {
            glob: pattern.to_string(),
            source,
        })
}

/// A decision's ordered `files` list: inclusions plus `!`-prefixed exclusions.
///
/// An exclusion anywhere in the list removes a path even when an earlier
/// inclusion matched it.
#[derive(Debug, Clone, Default)]
pub struct FilePatternSet {
    includes: Vec<(String, GlobMatcher)>,
    excludes: Option<GlobSet>,
}

impl FilePatternSet {
    pub fn compile(files: &[String]) -> Result<Self, GlobError> {
        let mut includes = Vec::new();
        let mut exclude_builder = GlobSetBuilder::new();
        let mut has_excludes = false;

        for raw in files {
            let normalized = normalize_pattern(raw);
            if let Some(negated) = normalized.strip_prefix('!') {
                let negated = normalize_pattern(negated);
                exclude_builder.add(build_glob(&negated)?);
                has_excludes = true;
            } else {
                let matcher = compile_glob(&normalized)?;
                includes.push((normalized, matcher));
            }
        }

        let excludes = if has_excludes {
            Some(
                exclude_builder
                    .build()
                    .map_err(|source| GlobError::Invalid {
                        glob: files.join(", "),
                        source,
                    })?,
            )
        } else {
            None
        };

        Ok(Self { includes, excludes })
    }

    /// The first inclusion pattern matching `path`, unless an exclusion matches.
    pub fn first_match(&self, path: &str) -> Option<&str> {
        if self.is_excluded(path) {
            return None;
        }
        self.includes
            .iter()
            .find(|(_, m)| m.is_match(path))
            .map(|(p, _)| p.as_str())
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.as_ref().is_some_and(|set| set.is_match(path))
    }

    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(|(p, _)| p.as_str())
    }

    pub fn has_includes(&self) -> bool {
        !self.includes.is_empty()
    }
}

fn build_glob(pattern: &str) -> Result<globset::Glob, GlobError> {
    if pattern.is_empty() {
        return Err(GlobError::Empty);
    }
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| GlobError::Invalid {
            glob: pattern.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(files: &[&str]) -> FilePatternSet {
        let files: Vec<String> = files.iter().map(|s| s.to_string()).collect();
        FilePatternSet::compile(&files).expect("compile")
    }

    #[test]
    fn splits_segments() {
        assert_eq!(
            segments("src/**/*.ts"),
            vec![
                Segment::Literal("src"),
                Segment::Globstar,
                Segment::Wildcard
            ]
        );
        assert_eq!(
            segments("{a,b}/x?.rs"),
            vec![Segment::Wildcard, Segment::Wildcard]
        );
        assert_eq!(segments("config/auth.yml").len(), 2);
        assert_eq!(segments("docs/\\*.md")[1], Segment::Wildcard);
    }

    #[test]
    fn star_does_not_cross_directories() {
        let m = compile_glob("src/*.ts").unwrap();
        assert!(m.is_match("src/a.ts"));
        assert!(!m.is_match("src/a/b.ts"));
    }

    #[test]
    fn globstar_matches_any_depth_including_zero() {
        let m = compile_glob("src/**/*.ts").unwrap();
        assert!(m.is_match("src/a/b.ts"));
        assert!(m.is_match("src/b.ts"));

        let root = compile_glob("**/test.ts").unwrap();
        assert!(root.is_match("test.ts"));
        assert!(root.is_match("a/b/test.ts"));
    }

    #[test]
    fn braces_and_classes() {
        let m = compile_glob("src/{api,web}/[abc].ts").unwrap();
        assert!(m.is_match("src/api/a.ts"));
        assert!(m.is_match("src/web/c.ts"));
        assert!(!m.is_match("src/cli/a.ts"));
        assert!(!m.is_match("src/api/d.ts"));
    }

    #[test]
    fn exclusion_wins_over_earlier_inclusion() {
        let s = set(&["src/**/*.ts", "!src/**/*.test.ts"]);
        assert_eq!(s.first_match("src/a/b.ts"), Some("src/**/*.ts"));
        assert_eq!(s.first_match("src/a/b.test.ts"), None);
    }

    #[test]
    fn reports_first_matching_inclusion() {
        let s = set(&["src/auth/**", "src/**"]);
        assert_eq!(s.first_match("src/auth/login.ts"), Some("src/auth/**"));
        assert_eq!(s.first_match("src/db.ts"), Some("src/**"));
        assert_eq!(s.first_match("lib/db.ts"), None);
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let err = FilePatternSet::compile(&["src/[".to_string()]).unwrap_err();
        assert!(matches!(err, GlobError::Invalid { .. }));
        assert!(matches!(compile_glob(""), Err(GlobError::Empty)));
    }
}
