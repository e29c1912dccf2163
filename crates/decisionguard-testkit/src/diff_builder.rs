//! Unified diff builders for constructing test diffs.
//!
//! Hunk headers are derived from the lines a hunk holds, so every built diff
//! is well-formed. Use [`FileBuilder::to_file_diff`] for engine input and
//! [`DiffBuilder::build`] for full `git diff` text.
//!
//! # Example
//!
//! ```rust
//! use decisionguard_testkit::diff_builder::DiffBuilder;
//!
//! let diff = DiffBuilder::new()
//!     .file("config/auth.yml")
//!         .hunk(3, 3)
//!             .context("auth:")
//!             .add_line("  provider: oidc")
//!             .done()
//!         .done()
//!     .build();
//!
//! assert!(diff.contains("+  provider: oidc"));
//! assert!(diff.contains("@@ -3,1 +3,2 @@"));
//! ```

use decisionguard_types::{FileDiff, FileStatus};

use crate::arb::{MAX_FILES, MAX_HUNKS_PER_FILE, MAX_LINE_LENGTH, MAX_LINES_PER_HUNK};

/// A builder for constructing multi-file `git diff` text.
#[derive(Debug, Clone, Default)]
pub struct DiffBuilder {
    files: Vec<FileBuilder>,
}

impl DiffBuilder {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Add a file to the diff and return a file builder.
    ///
    /// # Panics
    ///
    /// Panics if MAX_FILES would be exceeded.
    pub fn file(self, path: &str) -> FileBuilderInProgress {
        assert!(
            self.files.len() < MAX_FILES,
            "Cannot add more than {} files to a diff",
            MAX_FILES
        );
        FileBuilderInProgress {
            diff_builder: self,
            file_builder: FileBuilder::new(path),
        }
    }

    pub fn add_file(mut self, file: FileBuilder) -> Self {
        assert!(
            self.files.len() < MAX_FILES,
            "Cannot add more than {} files to a diff",
            MAX_FILES
        );
        self.files.push(file);
        self
    }

    /// Build the complete `git diff` text.
    pub fn build(&self) -> String {
        self.files
            .iter()
            .map(FileBuilder::build)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The same files as the engine's [`FileDiff`] input.
    pub fn file_diffs(&self) -> Vec<FileDiff> {
        self.files.iter().map(FileBuilder::to_file_diff).collect()
    }
}

/// Helper struct for building a file within a diff.
#[derive(Debug)]
pub struct FileBuilderInProgress {
    diff_builder: DiffBuilder,
    file_builder: FileBuilder,
}

impl FileBuilderInProgress {
    pub fn hunk(self, old_start: u32, new_start: u32) -> HunkBuilderInProgress {
        HunkBuilderInProgress {
            file_in_progress: self,
            hunk_builder: HunkBuilder::new(old_start, new_start),
        }
    }

    pub fn binary(mut self) -> Self {
        self.file_builder = self.file_builder.binary();
        self
    }

    pub fn deleted(mut self) -> Self {
        self.file_builder = self.file_builder.deleted();
        self
    }

    pub fn new_file(mut self) -> Self {
        self.file_builder = self.file_builder.new_file();
        self
    }

    pub fn rename_from(mut self, old_path: &str) -> Self {
        self.file_builder = self.file_builder.rename_from(old_path);
        self
    }

    /// Finish this file and return to the diff builder.
    pub fn done(mut self) -> DiffBuilder {
        self.diff_builder.files.push(self.file_builder);
        self.diff_builder
    }
}

/// Helper struct for building a hunk within a file.
#[derive(Debug)]
pub struct HunkBuilderInProgress {
    file_in_progress: FileBuilderInProgress,
    hunk_builder: HunkBuilder,
}

impl HunkBuilderInProgress {
    pub fn context(mut self, content: &str) -> Self {
        self.hunk_builder = self.hunk_builder.context(content);
        self
    }

    pub fn add_line(mut self, content: &str) -> Self {
        self.hunk_builder = self.hunk_builder.add_line(content);
        self
    }

    pub fn remove(mut self, content: &str) -> Self {
        self.hunk_builder = self.hunk_builder.remove(content);
        self
    }

    /// Finish this hunk and return to the file builder.
    pub fn done(mut self) -> FileBuilderInProgress {
        self.file_in_progress.file_builder = self
            .file_in_progress
            .file_builder
            .add_hunk(self.hunk_builder);
        self.file_in_progress
    }
}

/// A builder for a single file in a diff.
#[derive(Debug, Clone)]
pub struct FileBuilder {
    path: String,
    old_path: Option<String>,
    hunks: Vec<HunkBuilder>,
    is_binary: bool,
    is_deleted: bool,
    is_new_file: bool,
}

impl FileBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            old_path: None,
            hunks: Vec::new(),
            is_binary: false,
            is_deleted: false,
            is_new_file: false,
        }
    }

    pub fn binary(mut self) -> Self {
        self.is_binary = true;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn new_file(mut self) -> Self {
        self.is_new_file = true;
        self
    }

    pub fn rename_from(mut self, old_path: &str) -> Self {
        self.old_path = Some(old_path.to_string());
        self
    }

    /// # Panics
    ///
    /// Panics if MAX_HUNKS_PER_FILE would be exceeded.
    pub fn add_hunk(mut self, hunk: HunkBuilder) -> Self {
        assert!(
            self.hunks.len() < MAX_HUNKS_PER_FILE,
            "Cannot add more than {} hunks to a file",
            MAX_HUNKS_PER_FILE
        );
        self.hunks.push(hunk);
        self
    }

    /// Hunk text only, as a source-control host delivers it per file.
    pub fn patch(&self) -> String {
        self.hunks
            .iter()
            .map(HunkBuilder::build)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_file_diff(&self) -> FileDiff {
        let status = if self.is_new_file {
            FileStatus::Added
        } else if self.is_deleted {
            FileStatus::Removed
        } else if self.old_path.is_some() {
            FileStatus::Renamed
        } else {
            FileStatus::Modified
        };
        let additions: u32 = self.hunks.iter().map(HunkBuilder::added_count).sum();
        let deletions: u32 = self.hunks.iter().map(HunkBuilder::removed_count).sum();

        FileDiff {
            filename: self.path.clone(),
            status,
            additions,
            deletions,
            changes: additions + deletions,
            patch: if self.is_binary || self.hunks.is_empty() {
                None
            } else {
                Some(self.patch())
            },
            previous_filename: self.old_path.clone(),
        }
    }

    /// Build the `git diff` output for this file.
    pub fn build(&self) -> String {
        let mut lines = Vec::new();

        let a_path = self.old_path.as_deref().unwrap_or(&self.path);
        let b_path = &self.path;

        lines.push(format!("diff --git a/{} b/{}", a_path, b_path));

        if self.is_deleted {
            lines.push("deleted file mode 100644".to_string());
            lines.push("index 1111111..0000000".to_string());
            lines.push(format!("--- a/{}", a_path));
            lines.push("+++ /dev/null".to_string());
            for hunk in &self.hunks {
                lines.push(hunk.build());
            }
            return lines.join("\n");
        }

        if self.is_new_file {
            lines.push("new file mode 100644".to_string());
        }

        lines.push("index 0000000..1111111 100644".to_string());

        if self.is_binary {
            lines.push(format!("Binary files a/{} and b/{} differ", a_path, b_path));
            return lines.join("\n");
        }

        if self.old_path.is_some() {
            lines.push("similarity index 90%".to_string());
            lines.push(format!("rename from {}", a_path));
            lines.push(format!("rename to {}", b_path));
        }

        if self.is_new_file {
            lines.push("--- /dev/null".to_string());
        } else {
            lines.push(format!("--- a/{}", a_path));
        }
        lines.push(format!("+++ b/{}", b_path));

        for hunk in &self.hunks {
            lines.push(hunk.build());
        }

        lines.join("\n")
    }
}

/// A builder for one hunk. Line counts in the header are computed on build.
#[derive(Debug, Clone)]
pub struct HunkBuilder {
    old_start: u32,
    new_start: u32,
    lines: Vec<HunkLine>,
}

#[derive(Debug, Clone)]
enum HunkLine {
    Context(String),
    Add(String),
    Remove(String),
}

impl HunkBuilder {
    pub fn new(old_start: u32, new_start: u32) -> Self {
        Self {
            old_start,
            new_start,
            lines: Vec::new(),
        }
    }

    /// A hunk whose added lines occupy `new_start..` in the new file.
    pub fn additions_at(new_start: u32, lines: &[&str]) -> Self {
        Self::new(new_start.saturating_sub(1), new_start).add_lines(lines)
    }

    /// # Panics
    ///
    /// Panics if MAX_LINES_PER_HUNK would be exceeded.
    pub fn context(mut self, content: &str) -> Self {
        self.check_line_limits(content);
        self.lines.push(HunkLine::Context(content.to_string()));
        self
    }

    /// # Panics
    ///
    /// Panics if MAX_LINES_PER_HUNK would be exceeded.
    pub fn add_line(mut self, content: &str) -> Self {
        self.check_line_limits(content);
        self.lines.push(HunkLine::Add(content.to_string()));
        self
    }

    /// # Panics
    ///
    /// Panics if MAX_LINES_PER_HUNK would be exceeded.
    pub fn remove(mut self, content: &str) -> Self {
        self.check_line_limits(content);
        self.lines.push(HunkLine::Remove(content.to_string()));
        self
    }

    pub fn add_lines(mut self, lines: &[&str]) -> Self {
        for line in lines {
            self = self.add_line(line);
        }
        self
    }

    fn check_line_limits(&self, content: &str) {
        assert!(
            self.lines.len() < MAX_LINES_PER_HUNK,
            "Cannot add more than {} lines to a hunk",
            MAX_LINES_PER_HUNK
        );
        assert!(
            content.len() <= MAX_LINE_LENGTH,
            "Line content cannot exceed {} bytes",
            MAX_LINE_LENGTH
        );
    }

    fn added_count(&self) -> u32 {
        self.lines
            .iter()
            .filter(|l| matches!(l, HunkLine::Add(_)))
            .count() as u32
    }

    fn removed_count(&self) -> u32 {
        self.lines
            .iter()
            .filter(|l| matches!(l, HunkLine::Remove(_)))
            .count() as u32
    }

    /// New-file line numbers of the added lines, in order.
    pub fn added_line_numbers(&self) -> Vec<u32> {
        let mut line = self.new_start;
        let mut out = Vec::new();
        for l in &self.lines {
            match l {
                HunkLine::Context(_) => line += 1,
                HunkLine::Add(_) => {
                    out.push(line);
                    line += 1;
                }
                HunkLine::Remove(_) => {}
            }
        }
        out
    }

    pub fn build(&self) -> String {
        let context = self
            .lines
            .iter()
            .filter(|l| matches!(l, HunkLine::Context(_)))
            .count() as u32;
        let old_count = context + self.removed_count();
        let new_count = context + self.added_count();

        let mut output = Vec::with_capacity(self.lines.len() + 1);
        output.push(format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, old_count, self.new_start, new_count
        ));

        for line in &self.lines {
            match line {
                HunkLine::Context(content) => output.push(format!(" {}", content)),
                HunkLine::Add(content) => output.push(format!("+{}", content)),
                HunkLine::Remove(content) => output.push(format!("-{}", content)),
            }
        }

        output.join("\n")
    }
}
