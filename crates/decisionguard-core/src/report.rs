use std::collections::BTreeSet;

use serde::Serialize;

use decisionguard_types::{DecisionMatch, DecisionWarning, MatchOutcome, Severity, SeverityGroups};

use crate::fingerprint::match_fingerprint;

/// Split matches into critical, warning and info lists, keeping their order.
pub fn group_by_severity(matches: &[DecisionMatch]) -> SeverityGroups {
    let mut groups = SeverityGroups::default();
    for m in matches {
        let bucket = match m.decision.severity {
            Severity::Critical => &mut groups.critical,
            Severity::Warning => &mut groups.warning,
            Severity::Info => &mut groups.info,
        };
        bucket.push(m.clone());
    }
    groups
}

/// Lowest severity that makes a run fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailOn {
    #[default]
    Critical,
    Warning,
    Never,
}

impl FailOn {
    pub fn is_tripped_by(self, matches: &[DecisionMatch]) -> bool {
        let threshold = match self {
            FailOn::Critical => Severity::Critical,
            FailOn::Warning => Severity::Warning,
            FailOn::Never => return false,
        };
        matches.iter().any(|m| m.decision.severity >= threshold)
    }
}

pub fn render_markdown(outcome: &MatchOutcome) -> String {
    let groups = group_by_severity(&outcome.matches);
    let mut out = String::new();

    let decisions = outcome
        .matches
        .iter()
        .map(|m| m.decision.id.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    out.push_str(&format!(
        "## decisionguard: {} decision(s) affected\n\n",
        decisions
    ));

    if outcome.fallback {
        out.push_str(
            "**Note:** diff content was unavailable; matched on file paths only and skipped decisions with content rules.\n\n",
        );
    }

    if groups.is_empty() {
        out.push_str("No decisions affected.\n");
    } else {
        for (title, list) in [
            ("Critical", &groups.critical),
            ("Warning", &groups.warning),
            ("Info", &groups.info),
        ] {
            if list.is_empty() {
                continue;
            }
            out.push_str(&format!("### {title}\n\n"));
            out.push_str("| Decision | Title | File | Pattern | Evidence |\n");
            out.push_str("|---|---|---|---|---|\n");
            for m in list {
                out.push_str(&render_match_row(m));
            }
            out.push('\n');
        }
    }

    if !outcome.warnings.is_empty() {
        out.push_str("**Warnings:**\n");
        for w in &outcome.warnings {
            out.push_str(&format!("- `{}`: {}\n", escape_md(&w.decision_id), escape_md(&w.message)));
        }
        out.push('\n');
    }

    out
}

fn render_match_row(m: &DecisionMatch) -> String {
    let evidence = m
        .match_details
        .as_ref()
        .map(|d| {
            d.matched_patterns
                .iter()
                .map(|p| format!("`{}`", escape_md(p)))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    format!(
        "| `{id}` | {title} | `{file}` | `{pattern}` | {evidence} |\n",
        id = escape_md(&m.decision.id),
        title = escape_md(&m.decision.title),
        file = escape_md(&m.file),
        pattern = escape_md(&m.matched_pattern),
        evidence = evidence
    )
}

fn escape_md(s: &str) -> String {
    s.replace('|', "\\|").replace('`', "\\`")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMatch<'a> {
    fingerprint: String,
    severity: Severity,
    #[serde(flatten)]
    inner: &'a DecisionMatch,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    matches: Vec<JsonMatch<'a>>,
    warnings: &'a [DecisionWarning],
    fallback: bool,
}

/// Pretty JSON with a fingerprint and severity on every match.
pub fn render_json(outcome: &MatchOutcome) -> Result<String, serde_json::Error> {
    let report = JsonReport {
        matches: outcome
            .matches
            .iter()
            .map(|m| JsonMatch {
                fingerprint: match_fingerprint(m),
                severity: m.decision.severity,
                inner: m,
            })
            .collect(),
        warnings: &outcome.warnings,
        fallback: outcome.fallback,
    };
    serde_json::to_string_pretty(&report)
}
