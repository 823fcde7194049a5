//! # sealpack-contracts
//!
//! Shared types, error taxonomy, and data contracts for the sealpack
//! pipeline.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod audit;
pub mod digest;
pub mod error;
pub mod install;
pub mod log;
pub mod sandbox;

#[cfg(test)]
mod tests {
    use super::*;
    use audit::{AuditFinding, AuditReport};
    use digest::Digest;
    use error::SealpackError;
    use log::{Action, LogEntry, LogState};
    use sandbox::{NetworkMode, PolicyOverrides, SandboxPolicy};

    const ABC: &str = "abc1230000000000000000000000000000000000000000000000000000000000";

    // ── Digest ───────────────────────────────────────────────────────────────

    #[test]
    fn digest_parse_normalizes_case() {
        let upper = ABC.to_ascii_uppercase();
        let d: Digest = upper.parse().unwrap();
        assert_eq!(d.as_str(), ABC);
    }

    #[test]
    fn digest_rejects_wrong_length_and_alphabet() {
        assert!("abc123".parse::<Digest>().is_err());
        let bad = "z".repeat(64);
        assert!(bad.parse::<Digest>().is_err());
    }

    #[test]
    fn digest_deserialize_validates() {
        let ok: Result<Digest, _> = serde_json::from_str(&format!("\"{}\"", ABC));
        assert!(ok.is_ok());
        let bad: Result<Digest, _> = serde_json::from_str("\"nothex\"");
        assert!(bad.is_err());
    }

    // ── LogEntry ─────────────────────────────────────────────────────────────

    #[test]
    fn log_entry_omits_absent_fields() {
        let entry = LogEntry {
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            ..LogEntry::new(Action::Sign)
        }
        .with_artifact("pkg.tgz");

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":"2026-01-01T00:00:00.000Z","action":"sign","artifact":"pkg.tgz"}"#
        );
    }

    #[test]
    fn log_entry_timestamp_is_utc_millis() {
        let entry = LogEntry::new(Action::Demo);
        assert!(entry.timestamp.ends_with('Z'));
        // 2026-01-01T00:00:00.000Z
        assert_eq!(entry.timestamp.len(), 24);
    }

    #[test]
    fn log_state_uses_merkle_root_key() {
        let state = LogState::default();
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"entries":[],"merkleRoot":null}"#);
    }

    // ── AuditReport ──────────────────────────────────────────────────────────

    #[test]
    fn audit_report_score_is_unclamped_sum() {
        let findings = (0..30)
            .map(|i| AuditFinding {
                file: format!("f{}.js", i),
                reason: "lifecycle install script".to_string(),
                rule: "install-script".to_string(),
                score: 8,
            })
            .collect();
        let report = AuditReport::from_findings(findings);
        assert_eq!(report.score, 240);
        assert!(!report.is_clean());
    }

    // ── SandboxPolicy ────────────────────────────────────────────────────────

    #[test]
    fn sandbox_policy_defaults_are_locked_down() {
        let policy = SandboxPolicy::build(&PolicyOverrides::default());
        assert!(policy.read_only_rootfs());
        assert_eq!(policy.network(), NetworkMode::None);
        assert!(policy.capabilities().is_empty());
        assert!(policy.no_new_privileges());
        assert_ne!(policy.uid(), 0);
        assert_eq!(policy.memory(), SandboxPolicy::DEFAULT_MEMORY);
    }

    #[test]
    fn sandbox_policy_refuses_root_override() {
        let overrides = PolicyOverrides {
            uid: Some(0),
            gid: Some(0),
            memory: Some("1g".to_string()),
            ..Default::default()
        };
        let policy = SandboxPolicy::build(&overrides);
        assert_eq!(policy.uid(), SandboxPolicy::DEFAULT_UID);
        assert_eq!(policy.gid(), SandboxPolicy::DEFAULT_GID);
        assert_eq!(policy.memory(), "1g");
    }

    // ── SealpackError display messages ───────────────────────────────────────

    #[test]
    fn error_hash_mismatch_display() {
        let err = SealpackError::HashMismatch {
            artifact: "pkg.tgz".to_string(),
            expected: "aaa".to_string(),
            actual: "bbb".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pkg.tgz"));
        assert!(msg.contains("aaa"));
        assert!(msg.contains("bbb"));
    }

    #[test]
    fn error_extraction_carries_stderr() {
        let err = SealpackError::Extraction {
            artifact: "pkg.tgz".to_string(),
            exit_code: 2,
            stderr: "tar: invalid magic".to_string(),
        };
        assert!(err.to_string().contains("tar: invalid magic"));
    }

    #[test]
    fn error_not_found_names_path() {
        let err = SealpackError::not_found("artifact", "/tmp/missing.tgz");
        assert_eq!(err.to_string(), "artifact not found: /tmp/missing.tgz");
    }

    #[test]
    fn error_timeout_display() {
        let err = SealpackError::Timeout {
            operation: "sandbox extraction".to_string(),
            seconds: 120,
        };
        assert_eq!(err.to_string(), "sandbox extraction timed out after 120s");
    }
}
