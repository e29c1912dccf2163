//! Common test fixtures: sample decisions and diffs shared across crates.

use decisionguard_types::{ContentRule, Decision, FileDiff, FileRule, RuleCondition, Severity};

use crate::arb::decision;
use crate::diff_builder::{FileBuilder, HunkBuilder};

// =============================================================================
// Sample Decisions
// =============================================================================

pub mod sample_decisions {
    use super::*;

    /// `src/**/*.ts` minus tests, path-only.
    pub fn typescript_sources() -> Decision {
        decision(
            "ADR-001",
            Severity::Warning,
            vec!["src/**/*.ts".to_string(), "!src/**/*.test.ts".to_string()],
        )
    }

    /// Rule-only decision: auth config together with auth code.
    pub fn auth_boundary() -> Decision {
        Decision {
            rules: Some(RuleCondition::all(vec![
                RuleCondition::file("config/auth.yml"),
                RuleCondition::any(vec![
                    RuleCondition::file("src/auth/**/*.ts"),
                    RuleCondition::file("src/middleware/auth.ts"),
                ]),
            ])),
            ..decision("ADR-002", Severity::Critical, Vec::new())
        }
    }

    /// Changes to the first ten lines of `config/app.json`.
    pub fn config_header() -> Decision {
        Decision {
            rules: Some(RuleCondition::File(FileRule {
                content_rules: vec![ContentRule::LineRange { start: 1, end: 10 }],
                ..FileRule::new("config/app.json")
            })),
            ..decision("ADR-003", Severity::Info, vec!["config/app.json".to_string()])
        }
    }

    /// Secrets added anywhere under `src/`.
    pub fn hardcoded_secret() -> Decision {
        Decision {
            rules: Some(RuleCondition::File(FileRule {
                content_rules: vec![ContentRule::Regex {
                    pattern: r#"(api|secret)_key\s*=\s*""#.to_string(),
                    flags: Some("i".to_string()),
                }],
                ..FileRule::new("src/**")
            })),
            ..decision("ADR-004", Severity::Critical, vec!["src/**".to_string()])
        }
    }

    pub fn all() -> Vec<Decision> {
        vec![
            typescript_sources(),
            auth_boundary(),
            config_header(),
            hardcoded_secret(),
        ]
    }
}

// =============================================================================
// Sample Diffs
// =============================================================================

pub mod sample_diffs {
    use super::*;

    pub fn added_lines(path: &str, new_start: u32, lines: &[&str]) -> FileDiff {
        FileBuilder::new(path)
            .add_hunk(HunkBuilder::additions_at(new_start, lines))
            .to_file_diff()
    }

    pub fn auth_config() -> FileDiff {
        added_lines("config/auth.yml", 3, &["  provider: oidc"])
    }

    pub fn auth_login() -> FileDiff {
        added_lines("src/auth/login.ts", 1, &["export function login() {}"])
    }

    pub fn secret_in_source() -> FileDiff {
        added_lines("src/client.rs", 12, &[r#"let API_KEY = "abc123";"#])
    }

    /// A git diff touching two files, for the whole-diff parser.
    pub fn two_file_git_diff() -> String {
        crate::diff_builder::DiffBuilder::new()
            .file("config/auth.yml")
            .hunk(3, 3)
            .context("auth:")
            .add_line("  provider: oidc")
            .done()
            .done()
            .file("src/auth/login.ts")
            .new_file()
            .hunk(0, 1)
            .add_line("export function login() {}")
            .done()
            .done()
            .build()
    }
}
