use std::sync::Arc;

use decisionguard_diff::{PatchContent, parse_patch};
use decisionguard_types::FileDiff;
use tracing::debug;

use crate::path::normalize_path;

/// One changed file, normalized and with its patch parsed once per run.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub path: String,
    /// False when the collaborator delivered no patch text (binary, huge, path-only).
    pub has_patch: bool,
    pub content: PatchContent,
    added_text: Arc<str>,
}

impl ChangedFile {
    pub fn from_diff(diff: &FileDiff) -> Self {
        let path = normalize_path(&diff.filename);
        let patch = diff.patch.as_deref().unwrap_or("");
        let content = parse_patch(patch);
        if content.malformed_hunks > 0 {
            debug!(
                "{} malformed hunk(s) skipped in patch for {}",
                content.malformed_hunks, path
            );
        }
        let added_text: Arc<str> = Arc::from(content.added_text());
        Self {
            path,
            has_patch: !patch.is_empty(),
            content,
            added_text,
        }
    }

    pub fn path_only(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            has_patch: false,
            content: PatchContent::default(),
            added_text: Arc::from(""),
        }
    }

    /// Added lines joined with `\n`, shared so regex workers can hold it.
    pub fn added_text(&self) -> &Arc<str> {
        &self.added_text
    }
}

/// The set of changed files one run evaluates against.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    files: Vec<ChangedFile>,
}

impl ChangeSet {
    pub fn from_diffs(diffs: &[FileDiff]) -> Self {
        Self {
            files: diffs.iter().map(ChangedFile::from_diff).collect(),
        }
    }

    pub fn from_paths<S: AsRef<str>>(paths: &[S]) -> Self {
        Self {
            files: paths
                .iter()
                .map(|p| ChangedFile::path_only(p.as_ref()))
                .collect(),
        }
    }

    pub fn single(diff: &FileDiff) -> Self {
        Self {
            files: vec![ChangedFile::from_diff(diff)],
        }
    }

    pub fn files(&self) -> &[ChangedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_parses_once() {
        let diff = FileDiff::with_patch("src\\auth\\login.ts", "@@ -0,0 +1,1 @@\n+export {}");
        let set = ChangeSet::single(&diff);
        let f = &set.files()[0];
        assert_eq!(f.path, "src/auth/login.ts");
        assert!(f.has_patch);
        assert_eq!(f.added_text().as_ref(), "export {}");
    }

    #[test]
    fn missing_patch_is_empty_content() {
        let set = ChangeSet::from_diffs(&[FileDiff::path_only("logo.png")]);
        let f = &set.files()[0];
        assert!(!f.has_patch);
        assert!(f.content.added.is_empty());
        assert_eq!(set.len(), 1);
    }
}
