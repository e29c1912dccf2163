use std::path::Path;

use decisionguard_types::{FileDiff, FileStatus};
use tracing::debug;

/// Split a `git diff` style unified diff into one [`FileDiff`] per file.
///
/// Each file's `patch` holds its hunk text (from the first `@@` on), the way a
/// hosting API delivers it. Binary files and mode-only changes get no patch.
pub fn parse_unified_diff(diff_text: &str) -> Vec<FileDiff> {
    let mut out = Vec::new();
    let mut current: Option<FileSection> = None;

    for raw in diff_text.lines() {
        if raw.starts_with("diff --git ") {
            if let Some(section) = current.take() {
                out.push(section.finish());
            }
            current = Some(FileSection::from_diff_git_line(raw));
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        section.push(raw);
    }

    if let Some(section) = current.take() {
        out.push(section.finish());
    }

    debug!("Parsed {} file(s) from unified diff", out.len());
    out
}

#[derive(Debug, Default)]
struct FileSection {
    old_path: Option<String>,
    new_path: Option<String>,
    status: Option<FileStatus>,
    binary: bool,
    in_hunks: bool,
    patch: Vec<String>,
    additions: u32,
    deletions: u32,
}

impl FileSection {
    fn from_diff_git_line(line: &str) -> Self {
        // diff --git a/foo b/foo
        let mut it = line.split_whitespace().skip(2);
        let old_path = it.next().and_then(strip_prefix_path);
        let new_path = it.next().and_then(strip_prefix_path);
        Self {
            old_path,
            new_path,
            ..Self::default()
        }
    }

    fn push(&mut self, raw: &str) {
        if raw.starts_with("@@") {
            self.in_hunks = true;
        }

        if self.in_hunks {
            match raw.as_bytes().first().copied() {
                Some(b'+') => self.additions = self.additions.saturating_add(1),
                Some(b'-') => self.deletions = self.deletions.saturating_add(1),
                _ => {}
            }
            self.patch.push(raw.to_string());
            return;
        }

        if raw.starts_with("new file mode") {
            self.status = Some(FileStatus::Added);
        } else if raw.starts_with("deleted file mode") {
            self.status = Some(FileStatus::Removed);
        } else if let Some(from) = raw.strip_prefix("rename from ") {
            self.status = Some(FileStatus::Renamed);
            self.old_path = strip_prefix_path(from);
        } else if let Some(to) = raw.strip_prefix("rename to ") {
            self.new_path = strip_prefix_path(to);
        } else if let Some(from) = raw.strip_prefix("copy from ") {
            self.status = Some(FileStatus::Copied);
            self.old_path = strip_prefix_path(from);
        } else if let Some(to) = raw.strip_prefix("copy to ") {
            self.new_path = strip_prefix_path(to);
        } else if raw.starts_with("Binary files ") || raw == "GIT binary patch" {
            self.binary = true;
        } else if let Some(rest) = raw.strip_prefix("--- ") {
            if let Some(p) = parse_marker_path(rest) {
                self.old_path = Some(p);
            }
        } else if let Some(rest) = raw.strip_prefix("+++ ") {
            if let Some(p) = parse_marker_path(rest) {
                self.new_path = Some(p);
            }
        }
    }

    fn finish(self) -> FileDiff {
        let status = self.status.unwrap_or(FileStatus::Modified);
        let filename = match status {
            FileStatus::Removed => self.old_path.clone().or(self.new_path.clone()),
            _ => self.new_path.clone().or(self.old_path.clone()),
        }
        .unwrap_or_default();

        let previous_filename = match status {
            FileStatus::Renamed | FileStatus::Copied => self.old_path.clone(),
            _ => None,
        };

        let patch = if self.binary || self.patch.is_empty() {
            None
        } else {
            Some(self.patch.join("\n"))
        };

        FileDiff {
            filename,
            status,
            additions: self.additions,
            deletions: self.deletions,
            changes: self.additions.saturating_add(self.deletions),
            patch,
            previous_filename,
        }
    }
}

fn parse_marker_path(rest: &str) -> Option<String> {
    // "+++ b/foo\t2024-01-01" -> "foo"
    let first = rest.split('\t').next().unwrap_or(rest);
    if first == "/dev/null" {
        return None;
    }
    strip_prefix_path(first)
}

fn strip_prefix_path(p: &str) -> Option<String> {
    let p = p.trim();
    let p = p
        .strip_prefix("a/")
        .or_else(|| p.strip_prefix("b/"))
        .unwrap_or(p);

    // Normalize to forward slashes.
    let normalized = Path::new(p)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_files_and_keeps_hunk_text() {
        let diff = "\
diff --git a/src/lib.rs b/src/lib.rs
index 0000000..1111111 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,1 +1,2 @@
 fn a() {}
+fn b() {}
diff --git a/config/auth.yml b/config/auth.yml
--- a/config/auth.yml
+++ b/config/auth.yml
@@ -1,1 +1,1 @@
-ttl: 1
+ttl: 2
";

        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "src/lib.rs");
        assert_eq!(files[0].status, FileStatus::Modified);
        assert_eq!(
            files[0].patch.as_deref(),
            Some("@@ -1,1 +1,2 @@\n fn a() {}\n+fn b() {}")
        );
        assert_eq!(files[0].additions, 1);
        assert_eq!(files[1].filename, "config/auth.yml");
        assert_eq!((files[1].additions, files[1].deletions), (1, 1));
        assert_eq!(files[1].changes, 2);
    }

    #[test]
    fn new_and_deleted_files() {
        let diff = "\
diff --git a/new.txt b/new.txt
new file mode 100644
--- /dev/null
+++ b/new.txt
@@ -0,0 +1,1 @@
+hello
diff --git a/old.txt b/old.txt
deleted file mode 100644
--- a/old.txt
+++ /dev/null
@@ -1,1 +0,0 @@
-bye
";
        let files = parse_unified_diff(diff);
        assert_eq!(files[0].filename, "new.txt");
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[1].filename, "old.txt");
        assert_eq!(files[1].status, FileStatus::Removed);
    }

    #[test]
    fn renames_record_previous_filename() {
        let diff = "\
diff --git a/src/old.rs b/src/new.rs
similarity index 90%
rename from src/old.rs
rename to src/new.rs
--- a/src/old.rs
+++ b/src/new.rs
@@ -1,1 +1,2 @@
 fn a() {}
+fn b() {}
";
        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "src/new.rs");
        assert_eq!(files[0].status, FileStatus::Renamed);
        assert_eq!(files[0].previous_filename.as_deref(), Some("src/old.rs"));
    }

    #[test]
    fn binary_files_have_no_patch() {
        let diff = "\
diff --git a/logo.png b/logo.png
index 0000000..1111111 100644
Binary files a/logo.png and b/logo.png differ
";
        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "logo.png");
        assert!(files[0].patch.is_none());
    }

    #[test]
    fn text_before_first_file_is_ignored() {
        let files = parse_unified_diff("commit abc\nAuthor: someone\n\n");
        assert!(files.is_empty());
    }
}
