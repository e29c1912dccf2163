use tracing::warn;

/// A line added by the patch, numbered in the new version of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub line: u32,
    pub content: String,
}

/// The parsed content of one file's patch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatchContent {
    pub added: Vec<AddedLine>,
    pub removed: u32,
    pub hunks: u32,
    /// Hunk headers that could not be parsed; their bodies were skipped.
    pub malformed_hunks: u32,
}

impl PatchContent {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed == 0
    }

    /// Added lines joined with `\n`, the body content matchers search.
    pub fn added_text(&self) -> String {
        self.added
            .iter()
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn added_line_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.added.iter().map(|l| l.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchParseError {
    #[error("malformed hunk header: {0}")]
    MalformedHunkHeader(String),
}

/// Parse a hunk header.
///
/// Formats:
/// - `@@ -1,2 +3,4 @@`
/// - `@@ -1 +3 @@ fn context()` (omitted counts default to 1)
pub fn parse_hunk_header(line: &str) -> Result<HunkHeader, PatchParseError> {
    let malformed = || PatchParseError::MalformedHunkHeader(line.to_string());

    let mut parts = line.split_whitespace();
    if parts.next() != Some("@@") {
        return Err(malformed());
    }
    let minus = parts
        .next()
        .and_then(|p| p.strip_prefix('-'))
        .ok_or_else(malformed)?;
    let plus = parts
        .next()
        .and_then(|p| p.strip_prefix('+'))
        .ok_or_else(malformed)?;
    if parts.next() != Some("@@") {
        return Err(malformed());
    }

    let (old_start, old_count) = parse_range(minus).ok_or_else(malformed)?;
    let (new_start, new_count) = parse_range(plus).ok_or_else(malformed)?;

    Ok(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Parse a single file's patch text into added lines.
///
/// Line numbers come from the hunk headers, so they stay correct across
/// multiple hunks. Anything before the first hunk (including `diff --git`
/// and `---`/`+++` headers) is ignored. A malformed hunk header is logged and
/// its body skipped until the next valid header. Empty input yields empty content.
pub fn parse_patch(patch: &str) -> PatchContent {
    let mut out = PatchContent::default();

    let mut new_line_no: u32 = 0;
    let mut remaining_old: u32 = 0;
    let mut remaining_new: u32 = 0;
    let mut in_hunk = false;
    let mut skipping_malformed = false;

    for raw in patch.lines() {
        if raw.starts_with("@@") {
            match parse_hunk_header(raw) {
                Ok(hdr) => {
                    new_line_no = hdr.new_start;
                    remaining_old = hdr.old_count;
                    remaining_new = hdr.new_count;
                    in_hunk = remaining_old > 0 || remaining_new > 0;
                    skipping_malformed = false;
                    out.hunks = out.hunks.saturating_add(1);
                }
                Err(err) => {
                    warn!("{err}; skipping hunk body");
                    in_hunk = false;
                    skipping_malformed = true;
                    out.malformed_hunks = out.malformed_hunks.saturating_add(1);
                }
            }
            continue;
        }

        if !in_hunk || skipping_malformed {
            continue;
        }

        match raw.as_bytes().first().copied() {
            Some(b'+') => {
                out.added.push(AddedLine {
                    line: new_line_no,
                    content: raw[1..].to_string(),
                });
                new_line_no = new_line_no.saturating_add(1);
                remaining_new = remaining_new.saturating_sub(1);
            }
            Some(b'-') => {
                out.removed = out.removed.saturating_add(1);
                remaining_old = remaining_old.saturating_sub(1);
            }
            // "\ No newline at end of file"
            Some(b'\\') => {}
            // Context line; some tools strip the single leading space of blank lines.
            Some(b' ') | None => {
                new_line_no = new_line_no.saturating_add(1);
                remaining_old = remaining_old.saturating_sub(1);
                remaining_new = remaining_new.saturating_sub(1);
            }
            _ => {}
        }

        if remaining_old == 0 && remaining_new == 0 {
            in_hunk = false;
        }
    }

    out
}
