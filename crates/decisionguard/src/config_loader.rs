//! Loading of engine configuration and decision files.
//!
//! Decision files are JSON or TOML (by extension). Each decision is parsed
//! on its own, so one malformed entry becomes a warning instead of failing
//! the whole file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use decisionguard_types::{ConfigFile, Decision, DecisionWarning, EngineConfig};

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "decisionguard.toml";

/// Load `[engine]` settings from `path`, or from `./decisionguard.toml` if present.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !p.exists() {
                debug!("No {} found; using default engine settings", DEFAULT_CONFIG_FILE);
                return Ok(EngineConfig::default());
            }
            p
        }
    };

    debug!("Loading config from '{}'", path.display());
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let config: ConfigFile =
        toml::from_str(&text).with_context(|| format!("parse config '{}'", path.display()))?;
    Ok(config.engine)
}

#[derive(Debug, Default)]
pub struct LoadedDecisions {
    pub decisions: Vec<Decision>,
    /// Entries that could not be parsed.
    pub warnings: Vec<DecisionWarning>,
}

pub fn load_decisions(path: &Path) -> Result<LoadedDecisions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read decisions '{}'", path.display()))?;

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    let value: serde_json::Value = if is_toml {
        let parsed: toml::Value = toml::from_str(&text)
            .with_context(|| format!("parse decisions '{}'", path.display()))?;
        serde_json::to_value(parsed)
            .with_context(|| format!("convert decisions '{}'", path.display()))?
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("parse decisions '{}'", path.display()))?
    };

    let entries = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("decisions") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => bail!("'decisions' in '{}' is not a list", path.display()),
            None => Vec::new(),
        },
        _ => bail!(
            "decisions file '{}' must hold a list or a `decisions` table",
            path.display()
        ),
    };

    let source = path.display().to_string();
    let mut loaded = LoadedDecisions::default();

    for (i, entry) in entries.into_iter().enumerate() {
        let id = entry
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", i + 1));

        match serde_json::from_value::<Decision>(entry) {
            Ok(mut decision) => {
                if decision.source_file.is_none() {
                    decision.source_file = Some(source.clone());
                }
                loaded.decisions.push(decision);
            }
            Err(e) => {
                warn!("skipping decision {} in '{}': {}", id, source, e);
                loaded.warnings.push(DecisionWarning {
                    decision_id: id,
                    message: format!("could not parse decision: {e}"),
                });
            }
        }
    }

    debug!(
        "Loaded {} decision(s) from '{}' ({} skipped)",
        loaded.decisions.len(),
        source,
        loaded.warnings.len()
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, text).unwrap();
        p
    }

    #[test]
    fn loads_json_list_and_skips_bad_entries() {
        let dir = TempDir::new().unwrap();
        let p = write(
            &dir,
            "decisions.json",
            r#"[
                {"id": "ADR-001", "title": "t", "severity": "warning", "files": ["src/**"]},
                {"id": "ADR-002", "title": "t", "severity": "loud"},
                {"id": "ADR-003", "title": "t", "severity": "info",
                 "rules": {"match_mode": "any", "pattern": "x"}}
            ]"#,
        );

        let loaded = load_decisions(&p).unwrap();
        assert_eq!(loaded.decisions.len(), 1);
        assert_eq!(loaded.decisions[0].id, "ADR-001");
        assert!(loaded.decisions[0]
            .source_file
            .as_deref()
            .is_some_and(|s| s.ends_with("decisions.json")));

        let skipped: Vec<_> = loaded.warnings.iter().map(|w| w.decision_id.as_str()).collect();
        assert_eq!(skipped, vec!["ADR-002", "ADR-003"]);
    }

    #[test]
    fn loads_toml_decision_table() {
        let dir = TempDir::new().unwrap();
        let p = write(
            &dir,
            "decisions.toml",
            r#"
[[decisions]]
id = "ADR-010"
title = "Config header"
severity = "critical"
files = ["config/app.json"]

[decisions.rules]
type = "file"
pattern = "config/app.json"
content_rules = [{ mode = "line_range", start = 1, end = 10 }]
"#,
        );

        let loaded = load_decisions(&p).unwrap();
        assert!(loaded.warnings.is_empty());
        assert!(loaded.decisions[0].has_content_rules());
    }

    #[test]
    fn engine_config_defaults_when_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "custom.toml", "[engine]\nregex_timeout_ms = 250\n");
        assert_eq!(load_engine_config(Some(&p)).unwrap().regex_timeout_ms, 250);
        assert!(load_engine_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
