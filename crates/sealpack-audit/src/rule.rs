//! Audit rule types and configuration schema.
//!
//! A `RuleConfig` is deserialized from TOML and holds an ordered list of
//! `ScanRule`s plus the file selection lists. Unlike first-match policy
//! engines, every rule is evaluated against every file: a file can
//! contribute one finding per matching rule.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sealpack_contracts::error::{SealpackError, SealpackResult};

/// The rule document shipped with sealpack.
pub const BUILTIN_RULES: &str = include_str!("../rules/default.toml");

/// A single rule as written in TOML.
///
/// ```toml
/// [[rules]]
/// id = "eval"
/// pattern = '\beval\s*\('
/// score = 5
/// reason = "use of eval"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRule {
    /// Stable identifier recorded in each finding.
    pub id: String,
    /// Regular expression matched against the whole file text.
    pub pattern: String,
    pub score: u64,
    /// Human-readable description recorded in each finding.
    pub reason: String,
}

/// The top-level structure deserialized from a rule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// File extensions (without the dot) that mark a file as source.
    pub extensions: Vec<String>,
    /// Exact file names scanned regardless of extension.
    pub manifest_names: Vec<String>,
    /// Rules in evaluation order.
    pub rules: Vec<ScanRule>,
}

/// A rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: ScanRule,
    pub regex: Regex,
}

/// A validated, compiled rule set ready for scanning.
#[derive(Debug, Clone)]
pub struct RuleSet {
    extensions: Vec<String>,
    manifest_names: Vec<String>,
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// The embedded default rules.
    ///
    /// # Panics
    ///
    /// Panics if the embedded document is invalid, which the unit tests rule
    /// out.
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_RULES).expect("built-in rule set must be valid")
    }

    /// Parse and compile a TOML rule document.
    ///
    /// Returns `SealpackError::Config` for malformed TOML, an invalid regular
    /// expression, or a duplicate rule id.
    pub fn from_toml_str(s: &str) -> SealpackResult<Self> {
        let config: RuleConfig = toml::from_str(s).map_err(|e| SealpackError::Config {
            reason: format!("failed to parse audit rules TOML: {}", e),
        })?;
        Self::compile(config)
    }

    /// Read and compile a rule file.
    pub fn from_file(path: &Path) -> SealpackResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SealpackError::Config {
            reason: format!("failed to read audit rules '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn compile(config: RuleConfig) -> SealpackResult<Self> {
        let mut rules: Vec<CompiledRule> = Vec::with_capacity(config.rules.len());
        for rule in config.rules {
            if rules.iter().any(|r| r.rule.id == rule.id) {
                return Err(SealpackError::Config {
                    reason: format!("duplicate audit rule id '{}'", rule.id),
                });
            }
            let regex = Regex::new(&rule.pattern).map_err(|e| SealpackError::Config {
                reason: format!("audit rule '{}' has an invalid pattern: {}", rule.id, e),
            })?;
            debug!(rule_id = %rule.id, score = rule.score, "audit rule compiled");
            rules.push(CompiledRule { rule, regex });
        }

        Ok(Self {
            extensions: config
                .extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            manifest_names: config.manifest_names,
            rules,
        })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Return true if the file at `path` should be scanned.
    ///
    /// Source files are selected by extension (case-insensitive); manifests
    /// by exact file name only.
    pub fn is_relevant(&self, path: &Path) -> bool {
        let by_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.manifest_names.iter().any(|m| m == n));
        let by_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                let e = e.to_ascii_lowercase();
                self.extensions.iter().any(|x| *x == e)
            });
        by_name || by_ext
    }
}
