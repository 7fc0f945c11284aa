//! Rule file loading and structured rewriting.
//!
//! The rule file is YAML with a top-level `rules:` sequence. Loading
//! parses and validates every entry; any failure aborts the whole load so
//! a partial engine is never published. Admin mutations round-trip the
//! whole document through [`RuleFile`] -- the file is never rewritten at
//! the line level.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use certwatch_types::{CertwatchError, Priority};

use crate::engine::{Rule, RuleEngine};
use crate::parser::parse;

/// The rule file document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One rule entry as written in the file (and as sent to the admin API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: String,
    /// Keyword expression source (see [`crate::parser`]).
    #[serde(default)]
    pub keywords: String,
    /// Priority string; unknown values normalize to `medium`.
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub comment: String,
}

impl RuleFile {
    /// Read and parse the YAML document at `path`.
    ///
    /// A missing file yields an empty document, matching the loader's
    /// missing-file-is-empty-engine behavior.
    pub fn load(path: &Path) -> Result<Self, CertwatchError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(e) => {
                return Err(CertwatchError::StoreError(format!(
                    "failed to read rule file {}: {e}",
                    path.display()
                )))
            }
        };

        serde_yaml::from_str(&raw).map_err(|e| {
            CertwatchError::ParseError(format!(
                "failed to parse rule file {}: {e}",
                path.display()
            ))
        })
    }

    /// Serialize the document back to `path`.
    pub fn save(&self, path: &Path) -> Result<(), CertwatchError> {
        let raw = serde_yaml::to_string(self).map_err(|e| {
            CertwatchError::ParseError(format!("failed to serialize rule file: {e}"))
        })?;
        std::fs::write(path, raw).map_err(|e| {
            CertwatchError::StoreError(format!(
                "failed to write rule file {}: {e}",
                path.display()
            ))
        })
    }
}

/// Load the rule file and compile it into an engine.
///
/// A missing file returns an empty engine (not an error). A file that
/// exists but contains any invalid rule fails the whole load: every
/// per-rule error is collected into the message so the operator sees all
/// of them at once.
pub fn load_rules(path: &Path) -> Result<RuleEngine, CertwatchError> {
    let file = RuleFile::load(path)?;
    let engine = compile_rules(&file)?;
    info!(
        rules = engine.rules().len(),
        enabled = engine.enabled_count(),
        keywords = engine.keyword_count(),
        "rules loaded"
    );
    Ok(engine)
}

/// Compile a rule document into an engine without touching the filesystem.
///
/// The admin surface uses this to validate a rewritten document before
/// persisting it, so a bad mutation never lands on disk.
pub fn compile_rules(file: &RuleFile) -> Result<RuleEngine, CertwatchError> {
    let mut rules = Vec::with_capacity(file.rules.len());
    let mut failures: Vec<String> = Vec::new();

    for (i, config) in file.rules.iter().enumerate() {
        match compile_rule(config) {
            Ok(rule) => rules.push(rule),
            Err(e) => failures.push(format!("rule {i} ({}): {e}", config.name)),
        }
    }

    if !failures.is_empty() {
        return Err(CertwatchError::ParseError(format!(
            "failed to load rules:\n  - {}",
            failures.join("\n  - ")
        )));
    }

    RuleEngine::build(rules)
}

/// Validate one entry and compile its expression.
fn compile_rule(config: &RuleConfig) -> Result<Rule, CertwatchError> {
    let name = config.name.trim().to_string();
    if name.is_empty() {
        return Err(CertwatchError::InvalidRule {
            name: config.name.clone(),
            reason: "rule name is required".to_string(),
        });
    }
    if config.keywords.is_empty() {
        return Err(CertwatchError::InvalidRule {
            name,
            reason: "keywords are required".to_string(),
        });
    }

    let expr = parse(&config.keywords).map_err(|e| CertwatchError::InvalidRule {
        name: name.clone(),
        reason: e.to_string(),
    })?;

    Ok(Rule::new(
        name,
        expr,
        config.keywords.clone(),
        Priority::parse(&config.priority),
        config.enabled,
        config.comment.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_rules(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
        let path = dir.path().join("rules.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_empty_engine() {
        let dir = TempDir::new().unwrap();
        let engine = load_rules(&dir.path().join("nope.yaml")).unwrap();
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn loads_and_sorts_by_priority() {
        let dir = TempDir::new().unwrap();
        let path = write_rules(
            &dir,
            r#"
rules:
  - name: low-noise
    keywords: paypal
    priority: low
    enabled: true
    comment: ""
  - name: urgent
    keywords: paypal AND login
    priority: critical
    enabled: true
    comment: "credential phish"
"#,
        );
        let engine = load_rules(&path).unwrap();
        assert_eq!(engine.rules().len(), 2);
        assert_eq!(engine.rules()[0].name, "urgent");
        assert_eq!(engine.rules()[0].order, 0);
        assert_eq!(engine.rules()[1].name, "low-noise");
        assert_eq!(engine.rules()[1].priority, Priority::Low);
    }

    #[test]
    fn unknown_priority_normalizes_to_medium() {
        let dir = TempDir::new().unwrap();
        let path = write_rules(
            &dir,
            "rules:\n  - name: r\n    keywords: paypal\n    priority: whatever\n    enabled: true\n",
        );
        let engine = load_rules(&path).unwrap();
        assert_eq!(engine.rules()[0].priority, Priority::Medium);
    }

    #[test]
    fn one_bad_rule_fails_the_whole_load() {
        let dir = TempDir::new().unwrap();
        let path = write_rules(
            &dir,
            r#"
rules:
  - name: good
    keywords: paypal
    priority: high
    enabled: true
  - name: broken
    keywords: "paypal AND ("
    priority: high
    enabled: true
"#,
        );
        let err = load_rules(&path).unwrap_err();
        assert!(err.to_string().contains("broken"), "got: {err}");
    }

    #[test]
    fn nameless_rule_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write_rules(&dir, "rules:\n  - name: \"  \"\n    keywords: paypal\n");
        assert!(load_rules(&path).is_err());
    }

    #[test]
    fn rule_file_round_trips_through_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yaml");
        let file = RuleFile {
            rules: vec![RuleConfig {
                name: "r1".into(),
                keywords: "paypal AND NOT paypal.com".into(),
                priority: "high".into(),
                enabled: true,
                comment: "homoglyph watch".into(),
            }],
        };
        file.save(&path).unwrap();

        let back = RuleFile::load(&path).unwrap();
        assert_eq!(back.rules.len(), 1);
        assert_eq!(back.rules[0].name, "r1");
        assert_eq!(back.rules[0].keywords, "paypal AND NOT paypal.com");
        assert!(back.rules[0].enabled);
    }
}
