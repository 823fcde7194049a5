//! TOML configuration for sealpack.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults below.
//!
//! ```toml
//! [log]
//! path = ".sealpack/transparency-log.json"
//!
//! [sandbox]
//! image = "node:20-alpine"
//! memory = "256m"
//! timeout_secs = 120
//!
//! [signer]
//! backend = "ed25519"
//!
//! [audit]
//! max_risk_score = 20
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use sealpack_contracts::{
    error::{SealpackError, SealpackResult},
    sandbox::PolicyOverrides,
};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "sealpack.toml";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SealpackConfig {
    pub log: LogSettings,
    pub keys: KeySettings,
    pub sandbox: PolicyOverrides,
    pub signer: SignerSettings,
    pub audit: AuditSettings,
    pub summarizer: SummarizerSettings,
    pub source: SourceSettings,
}

impl SealpackConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `SealpackError::Config` if the document is malformed or has
    /// unknown keys.
    pub fn from_toml_str(s: &str) -> SealpackResult<Self> {
        toml::from_str(s).map_err(|e| SealpackError::Config {
            reason: format!("failed to parse config TOML: {}", e),
        })
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> SealpackResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SealpackError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load `explicit` if given (it must exist), else `./sealpack.toml` if it
    /// exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> SealpackResult<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    debug!(path = %fallback.display(), "loading config from working directory");
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub path: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".sealpack/transparency-log.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeySettings {
    /// Directory holding `signing-key.pem` / `signing-key.pub.pem`.
    pub dir: PathBuf,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".sealpack/keys"),
        }
    }
}

/// Which `Signer` implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignerBackend {
    /// In-process Ed25519.
    Ed25519,
    /// External binary driven by argument templates.
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignerSettings {
    pub backend: SignerBackend,
    /// Program for the `command` backend.
    pub program: String,
    /// Argument templates. Placeholders: `{artifact}`, `{key}`,
    /// `{signature}`, `{pubkey}`, `{dir}`.
    pub keygen_args: Vec<String>,
    pub sign_args: Vec<String>,
    pub verify_args: Vec<String>,
    /// Files the `keygen_args` invocation leaves in `{dir}`.
    pub private_key_file: String,
    pub public_key_file: String,
    pub timeout_secs: u64,
}

impl Default for SignerSettings {
    fn default() -> Self {
        let args = |a: &[&str]| a.iter().map(|s| s.to_string()).collect();
        Self {
            backend: SignerBackend::Ed25519,
            program: "cosign".to_string(),
            keygen_args: args(&["generate-key-pair", "--output-key-prefix", "{dir}/cosign"]),
            sign_args: args(&[
                "sign-blob",
                "--yes",
                "--key",
                "{key}",
                "--output-signature",
                "{signature}",
                "{artifact}",
            ]),
            verify_args: args(&[
                "verify-blob",
                "--key",
                "{pubkey}",
                "--signature",
                "{signature}",
                "{artifact}",
            ]),
            private_key_file: "cosign.key".to_string(),
            public_key_file: "cosign.pub".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSettings {
    /// Replace the built-in rule set with this TOML file.
    pub rules_path: Option<PathBuf>,
    /// Fail installs whose extracted tree scores above this.
    pub max_risk_score: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SummarizerSettings {
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key. Summaries are skipped when
    /// it is unset or empty.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl SummarizerSettings {
    /// The configured credential, if present and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    /// Package manager used to fetch registry specs.
    pub npm_program: String,
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            npm_program: "npm".to_string(),
            timeout_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = SealpackConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, SealpackConfig::default());
        assert_eq!(cfg.signer.backend, SignerBackend::Ed25519);
        assert!(cfg.audit.max_risk_score.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = SealpackConfig::from_toml_str(
            r#"
            [sandbox]
            memory = "512m"
            timeout_secs = 30

            [signer]
            backend = "command"
            program = "/usr/local/bin/cosign"

            [audit]
            max_risk_score = 15
            "#,
        )
        .unwrap();

        assert_eq!(cfg.sandbox.memory.as_deref(), Some("512m"));
        assert_eq!(cfg.sandbox.timeout_secs, Some(30));
        assert!(cfg.sandbox.image.is_none());
        assert_eq!(cfg.signer.backend, SignerBackend::Command);
        assert_eq!(cfg.signer.program, "/usr/local/bin/cosign");
        assert!(!cfg.signer.sign_args.is_empty());
        assert_eq!(cfg.audit.max_risk_score, Some(15));
        assert_eq!(cfg.log, LogSettings::default());
    }

    #[test]
    fn unknown_key_is_config_error() {
        let err = SealpackConfig::from_toml_str("[sandbox]\nnetwork = \"host\"\n").unwrap_err();
        assert!(matches!(err, SealpackError::Config { .. }));
    }

    #[test]
    fn explicit_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SealpackConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
