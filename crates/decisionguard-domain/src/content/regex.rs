//! Sandboxed regex execution for content rules.
//!
//! Patterns come from decision files and are treated as untrusted. Before a
//! pattern runs it passes a static gate (length, flags, catastrophic
//! backtracking shapes); the content body passes a size gate. Execution then
//! happens on a dedicated worker thread that only holds the compiled pattern
//! and the content, and the caller waits at most the configured deadline.
//! A timeout counts as "no match".

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use decisionguard_types::EngineConfig;

use super::cache::RegexCache;

/// Backtrack budget for the fancy-regex engine, independent of the deadline.
const BACKTRACK_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegexRejection {
    #[error("pattern is {len} characters, limit is {max}")]
    PatternTooLong { len: usize, max: usize },

    #[error("pattern contains nested or overlapping quantifiers that can backtrack catastrophically")]
    CatastrophicBacktracking,

    #[error("unsupported regex flag '{0}'")]
    UnsupportedFlag(char),

    #[error("invalid regex: {0}")]
    Invalid(String),
}

/// Result of one sandboxed regex evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexOutcome {
    Matched,
    NoMatch,
    /// The pattern failed the static gate or did not compile; it never ran.
    Rejected(RegexRejection),
    /// The content body exceeded the size gate; the pattern never ran.
    ContentTooLarge { len: usize, max: usize },
    TimedOut,
}

impl RegexOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, RegexOutcome::Matched)
    }
}

/// A compiled regex that auto-selects between linear-time and backtracking engines.
#[derive(Debug)]
pub enum CompiledRegex {
    /// Linear-time regex (O(n) guaranteed, no backtracking).
    Linear(regex::Regex),
    /// Backtracking regex (lookaround, backreferences), bounded by [`BACKTRACK_LIMIT`].
    Backtracking(fancy_regex::Regex),
}

impl CompiledRegex {
    /// Compile `pattern` with JavaScript-style `flags`.
    pub fn new(pattern: &str, flags: &str) -> Result<Self, RegexRejection> {
        let source = format!("{}{}", inline_flags(flags)?, pattern);
        if needs_backtracking_engine(pattern) {
            fancy_regex::RegexBuilder::new(&source)
                .backtrack_limit(BACKTRACK_LIMIT)
                .build()
                .map(Self::Backtracking)
                .map_err(|e| RegexRejection::Invalid(e.to_string()))
        } else {
            regex::Regex::new(&source)
                .map(Self::Linear)
                .map_err(|e| RegexRejection::Invalid(e.to_string()))
        }
    }

    /// For the backtracking engine, an execution error (backtrack limit) is no match.
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Linear(re) => re.is_match(text),
            Self::Backtracking(re) => re.is_match(text).unwrap_or(false),
        }
    }

    pub const fn uses_backtracking(&self) -> bool {
        matches!(self, Self::Backtracking(_))
    }
}

/// Translate JavaScript-style flags into an inline flag group.
///
/// `i`, `m` and `s` map to the same inline flags; `u` is always on; `g`, `y`
/// and `d` only affect iteration in JavaScript and are ignored.
fn inline_flags(flags: &str) -> Result<String, RegexRejection> {
    let mut inline = String::new();
    for c in flags.chars() {
        match c {
            'i' | 'm' | 's' => {
                if !inline.contains(c) {
                    inline.push(c);
                }
            }
            'u' | 'g' | 'y' | 'd' => {}
            other => return Err(RegexRejection::UnsupportedFlag(other)),
        }
    }
    if inline.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("(?{inline})"))
    }
}

/// Static gate: length, flags and backtracking shape. Does not compile.
pub fn check_pattern(pattern: &str, flags: &str, max_len: usize) -> Result<(), RegexRejection> {
    let len = pattern.chars().count();
    if len > max_len {
        return Err(RegexRejection::PatternTooLong { len, max: max_len });
    }
    inline_flags(flags)?;
    if has_catastrophic_backtracking(pattern) {
        return Err(RegexRejection::CatastrophicBacktracking);
    }
    Ok(())
}

/// Check if a pattern requires the backtracking engine.
///
/// Returns `true` for lookahead/lookbehind, atomic groups, possessive
/// quantifiers and backreferences. False positives only cost speed.
pub fn needs_backtracking_engine(pattern: &str) -> bool {
    if pattern.contains("(?=")
        || pattern.contains("(?!")
        || pattern.contains("(?<=")
        || pattern.contains("(?<!")
        || pattern.contains("(?>")
    {
        return true;
    }

    if pattern.contains("*+")
        || pattern.contains("++")
        || pattern.contains("?+")
        || pattern.contains("}+")
    {
        return true;
    }

    let bytes = pattern.as_bytes();
    for i in 0..bytes.len().saturating_sub(1) {
        if bytes[i] == b'\\' {
            let next = bytes[i + 1];
            if next.is_ascii_digit() && next != b'0' {
                return true;
            }
        }
    }

    false
}

#[derive(Debug, Default)]
struct GroupFrame {
    /// Some atom inside the group carries an unbounded quantifier.
    has_unbounded: bool,
    alternatives: Vec<String>,
    current: String,
}

impl GroupFrame {
    fn has_overlapping_alternatives(&self) -> bool {
        if self.alternatives.is_empty() {
            return false;
        }
        let mut all: Vec<&str> = self.alternatives.iter().map(String::as_str).collect();
        all.push(&self.current);
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                if a.is_empty() || b.is_empty() || a.starts_with(b) || b.starts_with(a) {
                    return true;
                }
            }
        }
        false
    }

    fn text(&self) -> String {
        let mut out = self.alternatives.join("|");
        if !self.alternatives.is_empty() {
            out.push('|');
        }
        out.push_str(&self.current);
        out
    }
}

/// Detect pattern shapes prone to exponential backtracking.
///
/// Flags a group that is itself under an unbounded quantifier (`*`, `+`,
/// `{n,}`) when its body also contains an unbounded quantifier, as in
/// `(a+)+`, `(\w*)*` or `((ab)+c)*`, or when its alternatives overlap, as in
/// `(a|a)+` or `(a|ab)*`. This is a syntactic heuristic and errs towards
/// rejecting.
pub fn has_catastrophic_backtracking(pattern: &str) -> bool {
    let chars: Vec<char> = pattern.chars().collect();
    let mut stack: Vec<GroupFrame> = vec![GroupFrame::default()];
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let end = (i + 2).min(chars.len());
                push_text(&mut stack, &chars[i..end]);
                i = end;
                continue;
            }
            '[' => {
                let end = class_end(&chars, i);
                push_text(&mut stack, &chars[i..end]);
                i = end;
                continue;
            }
            '(' => {
                stack.push(GroupFrame::default());
                i = skip_group_prefix(&chars, i + 1);
                continue;
            }
            ')' => {
                if stack.len() == 1 {
                    // Unbalanced; the compiler will reject it.
                    i += 1;
                    continue;
                }
                let Some(frame) = stack.pop() else {
                    break;
                };
                let quantifier = unbounded_quantifier_len(&chars, i + 1);
                if quantifier.is_some()
                    && (frame.has_unbounded || frame.has_overlapping_alternatives())
                {
                    return true;
                }
                if let Some(parent) = stack.last_mut() {
                    parent.has_unbounded |= frame.has_unbounded || quantifier.is_some();
                    parent.current.push('(');
                    parent.current.push_str(&frame.text());
                    parent.current.push(')');
                }
                i += 1 + quantifier.unwrap_or(0);
                continue;
            }
            '|' => {
                if let Some(frame) = stack.last_mut() {
                    let alt = std::mem::take(&mut frame.current);
                    frame.alternatives.push(alt);
                }
            }
            '*' | '+' | '{' => {
                if let Some(len) = unbounded_quantifier_len(&chars, i) {
                    if let Some(frame) = stack.last_mut() {
                        frame.has_unbounded = true;
                    }
                    i += len;
                    continue;
                }
                push_text(&mut stack, &chars[i..i + 1]);
            }
            _ => push_text(&mut stack, &chars[i..i + 1]),
        }
        i += 1;
    }

    false
}

fn push_text(stack: &mut [GroupFrame], text: &[char]) {
    if let Some(frame) = stack.last_mut() {
        frame.current.extend(text.iter());
    }
}

/// Length of an unbounded quantifier starting at `i`: `*`, `+` or `{n,}`.
fn unbounded_quantifier_len(chars: &[char], i: usize) -> Option<usize> {
    match chars.get(i)? {
        '*' | '+' => Some(1),
        '{' => {
            let mut j = i + 1;
            let digits_start = j;
            while chars.get(j).is_some_and(char::is_ascii_digit) {
                j += 1;
            }
            if j == digits_start || chars.get(j) != Some(&',') {
                return None;
            }
            j += 1;
            if chars.get(j) != Some(&'}') {
                return None;
            }
            Some(j + 1 - i)
        }
        _ => None,
    }
}

/// Index just past the `]` closing the class opened at `start`.
fn class_end(chars: &[char], start: usize) -> usize {
    let mut j = start + 1;
    if chars.get(j) == Some(&'^') {
        j += 1;
    }
    // A leading `]` is literal.
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            ']' => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

/// Skip `?:`, `?=`, `?!`, `?<=`, `?<!`, `?>`, `?<name>`, `?P<name>` and inline flags.
fn skip_group_prefix(chars: &[char], i: usize) -> usize {
    if chars.get(i) != Some(&'?') {
        return i;
    }
    let j = i + 1;
    match chars.get(j) {
        Some(':' | '=' | '!' | '>') => j + 1,
        Some('<') if matches!(chars.get(j + 1), Some('=' | '!')) => j + 2,
        Some('<') | Some('P') => {
            let mut k = j;
            while k < chars.len() && chars[k] != '>' {
                k += 1;
            }
            (k + 1).min(chars.len())
        }
        _ => {
            let mut k = j;
            while chars.get(k).is_some_and(|c| c.is_ascii_alphabetic() || *c == '-') {
                k += 1;
            }
            if chars.get(k) == Some(&':') {
                k += 1;
            }
            k
        }
    }
}

/// Gated, cached, deadline-bounded regex execution.
///
/// The result cache is injected so callers decide its lifetime and sharing.
#[derive(Debug)]
pub struct RegexSandbox {
    cache: Arc<RegexCache>,
    /// Unbounded: keys are the `(pattern, flags)` pairs of the loaded
    /// decisions, so its size is fixed by the decision set.
    compiled: Mutex<HashMap<(String, String), Arc<CompiledRegex>>>,
    timeout: Duration,
    max_content_bytes: usize,
    max_pattern_len: usize,
}

impl RegexSandbox {
    pub fn new(config: &EngineConfig, cache: Arc<RegexCache>) -> Self {
        Self {
            cache,
            compiled: Mutex::new(HashMap::new()),
            timeout: Duration::from_millis(config.regex_timeout_ms),
            max_content_bytes: config.max_content_bytes,
            max_pattern_len: config.max_regex_pattern_len,
        }
    }

    pub fn cache(&self) -> &Arc<RegexCache> {
        &self.cache
    }

    /// Evaluate `pattern` against `content`. Never panics and never blocks past the deadline.
    pub fn evaluate(&self, pattern: &str, flags: &str, content: &Arc<str>) -> RegexOutcome {
        if let Err(reason) = check_pattern(pattern, flags, self.max_pattern_len) {
            warn!("regex '{}' rejected before execution: {}", pattern, reason);
            return RegexOutcome::Rejected(reason);
        }

        if content.len() > self.max_content_bytes {
            warn!(
                "content of {} bytes exceeds regex limit of {} bytes; treating '{}' as no match",
                content.len(),
                self.max_content_bytes,
                pattern
            );
            return RegexOutcome::ContentTooLarge {
                len: content.len(),
                max: self.max_content_bytes,
            };
        }

        let key = RegexCache::key(pattern, flags, content);
        if let Some(hit) = self.cache.get(&key) {
            return if hit {
                RegexOutcome::Matched
            } else {
                RegexOutcome::NoMatch
            };
        }

        let compiled = match self.compiled(pattern, flags) {
            Ok(c) => c,
            Err(reason) => {
                warn!("regex '{}' failed to compile: {}", pattern, reason);
                return RegexOutcome::Rejected(reason);
            }
        };

        match self.run_with_deadline(compiled, Arc::clone(content)) {
            Some(matched) => {
                self.cache.insert(key, matched);
                if matched {
                    RegexOutcome::Matched
                } else {
                    RegexOutcome::NoMatch
                }
            }
            None => {
                warn!(
                    "regex '{}' exceeded {} ms deadline; treating as no match",
                    pattern,
                    self.timeout.as_millis()
                );
                RegexOutcome::TimedOut
            }
        }
    }

    fn compiled(&self, pattern: &str, flags: &str) -> Result<Arc<CompiledRegex>, RegexRejection> {
        let key = (pattern.to_string(), flags.to_string());
        {
            let compiled = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(re) = compiled.get(&key) {
                return Ok(Arc::clone(re));
            }
        }

        let re = Arc::new(CompiledRegex::new(pattern, flags)?);
        let mut compiled = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(compiled.entry(key).or_insert(re)))
    }

    /// Run on a worker thread; `None` when the deadline passes first.
    ///
    /// A timed-out worker is detached and finishes on its own; its result is dropped.
    fn run_with_deadline(&self, re: Arc<CompiledRegex>, content: Arc<str>) -> Option<bool> {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("decisionguard-regex".to_string())
            .spawn(move || {
                // The receiver is gone once the deadline has passed.
                let _ = tx.send(re.is_match(&content));
            });

        if let Err(e) = spawned {
            warn!("failed to spawn regex worker: {e}");
            return Some(false);
        }

        match rx.recv_timeout(self.timeout) {
            Ok(matched) => Some(matched),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("regex worker exited without a result");
                Some(false)
            }
        }
    }
}
