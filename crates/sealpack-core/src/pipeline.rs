//! The secure install pipeline: the fail-closed, ordered installer.
//!
//! The pipeline enforces the install state machine:
//!
//!   START → HASHED → SIGNATURE_CHECKED → EXTRACTED → [AUDITED] → DONE
//!
//! Any failing transition returns `Err` immediately (ABORTED) and no later
//! step runs. The extractor is reachable only after the digest gate and,
//! when requested, the signature gate have both passed. The transparency
//! log is written last, so it reflects completed installs only.
//!
//! The artifact is read once: it is copied into a private staging directory
//! while being hashed, and the signer and extractor only ever see that copy.

use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use sealpack_contracts::{
    digest::Digest,
    error::{SealpackError, SealpackResult},
    install::{InstallReport, InstallRequest, InstallState, SignatureCheck},
    log::{Action, LogEntry},
};

use crate::{
    digest::stage_file,
    traits::{Extractor, PackageAuditor, Signer, TransparencySink},
};

/// Drives one artifact at a time through the install state machine.
///
/// The pipeline owns its capabilities and holds no per-install state, so a
/// single instance may serve sequential installs. Concurrent installs should
/// each use their own pipeline sharing one `TransparencySink`.
pub struct InstallPipeline {
    signer: Box<dyn Signer>,
    extractor: Box<dyn Extractor>,
    auditor: Box<dyn PackageAuditor>,
    log: Box<dyn TransparencySink>,
}

impl InstallPipeline {
    pub fn new(
        signer: Box<dyn Signer>,
        extractor: Box<dyn Extractor>,
        auditor: Box<dyn PackageAuditor>,
        log: Box<dyn TransparencySink>,
    ) -> Self {
        Self {
            signer,
            extractor,
            auditor,
            log,
        }
    }

    /// Install one artifact.
    ///
    /// # Pipeline
    ///
    /// 1. Copy the artifact into a private staging directory, hashing it on
    ///    the way. A mismatch with `expected_digest` aborts with
    ///    `HashMismatch`. Every later step reads the staged copy.
    /// 2. If `options.signature` is set, verify it; a negative result aborts
    ///    with `SignatureVerification`. Otherwise record `Skipped`.
    /// 3. Extract inside the sandbox; non-zero exit aborts with `Extraction`.
    /// 4. If `options.max_risk_score` is set, scan the extractor's
    ///    `extracted_root`; a higher score aborts with
    ///    `RiskThresholdExceeded`.
    /// 5. Append one `install` entry to the transparency log.
    ///
    /// # Errors
    ///
    /// Every error corresponds to the ABORTED state. Partially extracted
    /// output from step 3 or 4 is left on disk and must be treated as
    /// untrusted.
    pub fn install(&self, request: &InstallRequest) -> SealpackResult<InstallReport> {
        let artifact = request.artifact.display().to_string();
        let mut state = InstallState::Start;

        debug!(artifact = %artifact, state = %state, "install starting");

        // ── START → HASHED ───────────────────────────────────────────────────
        //
        // Primary integrity gate. Nothing touches the sandbox before this.
        let staging = staging_dir().inspect_err(|e| abort(&artifact, state, e))?;
        let (staged, computed) = stage_file(&request.artifact, staging.path())
            .inspect_err(|e| abort(&artifact, state, e))?;
        debug!(artifact = %artifact, staged = %staged.display(), "artifact staged");

        if let Some(expected) = &request.expected_digest {
            if *expected != computed {
                let err = SealpackError::HashMismatch {
                    artifact: artifact.clone(),
                    expected: expected.to_string(),
                    actual: computed.to_string(),
                };
                abort(&artifact, state, &err);
                return Err(err);
            }
        }
        state = advance(&artifact, state, InstallState::Hashed);

        // ── HASHED → SIGNATURE_CHECKED ───────────────────────────────────────
        let signature = match &request.options.signature {
            Some(material) => {
                let valid = self
                    .signer
                    .verify(&staged, &material.signature, &material.public_key)
                    .inspect_err(|e| abort(&artifact, state, e))?;
                if !valid {
                    let err = SealpackError::SignatureVerification {
                        artifact: artifact.clone(),
                        reason: format!(
                            "signature '{}' does not match public key '{}' ({})",
                            material.signature.display(),
                            material.public_key.display(),
                            self.signer.name()
                        ),
                    };
                    abort(&artifact, state, &err);
                    return Err(err);
                }
                SignatureCheck::Verified
            }
            None => {
                debug!(artifact = %artifact, "signature verification not requested, skipping");
                SignatureCheck::Skipped
            }
        };
        state = advance(&artifact, state, InstallState::SignatureChecked);

        // ── SIGNATURE_CHECKED → EXTRACTED ────────────────────────────────────
        let (policy, output) = self
            .extractor
            .extract(&staged, &request.output_dir, &request.options.sandbox)
            .inspect_err(|e| abort(&artifact, state, e))?;

        if !output.success() {
            let err = SealpackError::Extraction {
                artifact: artifact.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            };
            abort(&artifact, state, &err);
            return Err(err);
        }
        state = advance(&artifact, state, InstallState::Extracted);

        // ── EXTRACTED → AUDITED (optional) ───────────────────────────────────
        let audit = match request.options.max_risk_score {
            Some(threshold) => {
                let root = self.extractor.extracted_root(&request.output_dir);
                let report = self
                    .auditor
                    .scan(&root)
                    .inspect_err(|e| abort(&artifact, state, e))?;
                if report.score > threshold {
                    let err = SealpackError::RiskThresholdExceeded {
                        score: report.score,
                        threshold,
                    };
                    abort(&artifact, state, &err);
                    return Err(err);
                }
                state = advance(&artifact, state, InstallState::Audited);
                Some(report)
            }
            None => None,
        };

        // ── → DONE ───────────────────────────────────────────────────────────
        let entry = LogEntry::new(Action::Install)
            .with_artifact(artifact_name(request))
            .with_hash(computed.clone())
            .with_policy(policy);
        let merkle_root: Digest = self
            .log
            .append(entry)
            .inspect_err(|e| abort(&artifact, state, e))?;

        let state = advance(&artifact, state, InstallState::Done);
        info!(
            artifact = %artifact,
            digest = %computed,
            signature = ?signature,
            merkle_root = %merkle_root,
            "install complete"
        );

        Ok(InstallReport {
            state,
            artifact: request.artifact.clone(),
            digest: computed,
            signature,
            output_dir: request.output_dir.clone(),
            stdout: output.stdout,
            audit,
            merkle_root,
        })
    }
}

/// Per-install directory holding the staged artifact.
///
/// Only the owner can write to it. It is world-readable so the unprivileged
/// sandbox user can read the mounted copy.
fn staging_dir() -> SealpackResult<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix("sealpack-stage-")
        .tempdir()
        .map_err(|e| SealpackError::io(std::env::temp_dir(), e))?;
    allow_sandbox_read(dir.path())?;
    Ok(dir)
}

#[cfg(unix)]
fn allow_sandbox_read(dir: &Path) -> SealpackResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| SealpackError::io(dir, e))
}

#[cfg(not(unix))]
fn allow_sandbox_read(_dir: &Path) -> SealpackResult<()> {
    Ok(())
}

fn artifact_name(request: &InstallRequest) -> String {
    request
        .artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.artifact.display().to_string())
}

fn advance(artifact: &str, from: InstallState, to: InstallState) -> InstallState {
    debug!(artifact = %artifact, from = %from, to = %to, "install state transition");
    to
}

fn abort(artifact: &str, from: InstallState, err: &SealpackError) {
    warn!(
        artifact = %artifact,
        from = %from,
        to = %InstallState::Aborted,
        error = %err,
        "install aborted"
    );
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        path::{Path, PathBuf},
        sync::{Arc, Mutex},
    };

    use sealpack_contracts::{
        audit::{AuditFinding, AuditReport},
        digest::Digest,
        error::{SealpackError, SealpackResult},
        install::{
            InstallOptions, InstallRequest, InstallState, SignatureCheck, SignatureMaterial,
        },
        log::{Action, LogEntry},
        sandbox::{ExecOutput, PolicyOverrides},
    };

    use crate::{
        digest::digest_bytes,
        traits::{Extractor, KeyPairPaths, PackageAuditor, Signer, TransparencySink},
    };

    use super::InstallPipeline;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A signer whose verify result is fixed and whose calls are counted.
    /// With `swap` set it overwrites that file while verifying.
    struct MockSigner {
        valid: bool,
        verify_calls: Arc<Mutex<u32>>,
        swap: Option<PathBuf>,
    }

    impl Signer for MockSigner {
        fn name(&self) -> &str {
            "mock"
        }

        fn generate_keypair(&self, _dir: &Path) -> SealpackResult<KeyPairPaths> {
            unreachable!("pipeline never generates keys")
        }

        fn sign(&self, _artifact: &Path, _key: &Path) -> SealpackResult<PathBuf> {
            unreachable!("pipeline never signs")
        }

        fn verify(&self, _a: &Path, _s: &Path, _p: &Path) -> SealpackResult<bool> {
            *self.verify_calls.lock().unwrap() += 1;
            if let Some(path) = &self.swap {
                std::fs::write(path, b"malicious replacement").unwrap();
            }
            Ok(self.valid)
        }
    }

    /// An extractor that records the artifact path and bytes it was handed
    /// and returns a fixed exit code.
    struct MockExtractor {
        exit_code: i32,
        calls: Arc<Mutex<Vec<PathBuf>>>,
        seen_bytes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Extractor for MockExtractor {
        fn extract(
            &self,
            artifact: &Path,
            _output_dir: &Path,
            _overrides: &PolicyOverrides,
        ) -> SealpackResult<(String, ExecOutput)> {
            self.calls.lock().unwrap().push(artifact.to_path_buf());
            self.seen_bytes
                .lock()
                .unwrap()
                .push(std::fs::read(artifact).unwrap());
            Ok((
                "mock-policy".to_string(),
                ExecOutput {
                    exit_code: self.exit_code,
                    stdout: "extracted".to_string(),
                    stderr: if self.exit_code == 0 {
                        String::new()
                    } else {
                        "tar: unexpected EOF".to_string()
                    },
                },
            ))
        }

        fn extracted_root(&self, output_dir: &Path) -> PathBuf {
            output_dir.join("package")
        }
    }

    struct MockAuditor {
        score: u64,
        roots: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl PackageAuditor for MockAuditor {
        fn scan(&self, root: &Path) -> SealpackResult<AuditReport> {
            self.roots.lock().unwrap().push(root.to_path_buf());
            Ok(AuditReport::from_findings(vec![AuditFinding {
                file: "index.js".to_string(),
                reason: "use of eval".to_string(),
                rule: "eval".to_string(),
                score: self.score,
            }]))
        }
    }

    /// A sink that records entries and returns a digest of the entry count.
    struct MockSink {
        entries: Arc<Mutex<Vec<LogEntry>>>,
    }

    impl TransparencySink for MockSink {
        fn append(&self, entry: LogEntry) -> SealpackResult<Digest> {
            let mut entries = self.entries.lock().unwrap();
            entries.push(entry);
            Ok(digest_bytes(entries.len().to_string().as_bytes()))
        }
    }

    struct Harness {
        pipeline: InstallPipeline,
        verify_calls: Arc<Mutex<u32>>,
        extract_calls: Arc<Mutex<Vec<PathBuf>>>,
        extracted_bytes: Arc<Mutex<Vec<Vec<u8>>>>,
        audit_roots: Arc<Mutex<Vec<PathBuf>>>,
        entries: Arc<Mutex<Vec<LogEntry>>>,
    }

    impl Harness {
        fn audit_calls(&self) -> usize {
            self.audit_roots.lock().unwrap().len()
        }
    }

    fn harness(signature_valid: bool, exit_code: i32, audit_score: u64) -> Harness {
        harness_swapping(signature_valid, exit_code, audit_score, None)
    }

    fn harness_swapping(
        signature_valid: bool,
        exit_code: i32,
        audit_score: u64,
        swap: Option<PathBuf>,
    ) -> Harness {
        let verify_calls = Arc::new(Mutex::new(0));
        let extract_calls = Arc::new(Mutex::new(vec![]));
        let extracted_bytes = Arc::new(Mutex::new(vec![]));
        let audit_roots = Arc::new(Mutex::new(vec![]));
        let entries = Arc::new(Mutex::new(vec![]));
        let pipeline = InstallPipeline::new(
            Box::new(MockSigner {
                valid: signature_valid,
                verify_calls: verify_calls.clone(),
                swap,
            }),
            Box::new(MockExtractor {
                exit_code,
                calls: extract_calls.clone(),
                seen_bytes: extracted_bytes.clone(),
            }),
            Box::new(MockAuditor {
                score: audit_score,
                roots: audit_roots.clone(),
            }),
            Box::new(MockSink {
                entries: entries.clone(),
            }),
        );
        Harness {
            pipeline,
            verify_calls,
            extract_calls,
            extracted_bytes,
            audit_roots,
            entries,
        }
    }

    fn artifact(dir: &Path) -> PathBuf {
        let path = dir.join("pkg.tgz");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"not really a tarball").unwrap();
        path
    }

    fn request(artifact: PathBuf, expected: Option<Digest>, options: InstallOptions) -> InstallRequest {
        let output_dir = artifact.parent().unwrap().join("out");
        InstallRequest {
            artifact,
            expected_digest: expected,
            output_dir,
            options,
        }
    }

    fn signature_options() -> InstallOptions {
        InstallOptions {
            signature: Some(SignatureMaterial {
                signature: PathBuf::from("pkg.tgz.sig"),
                public_key: PathBuf::from("key.pub.pem"),
            }),
            ..Default::default()
        }
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn happy_path_reaches_done_and_logs_one_install() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let expected = digest_bytes(b"not really a tarball");
        let h = harness(true, 0, 0);

        let report = h
            .pipeline
            .install(&request(path, Some(expected.clone()), InstallOptions::default()))
            .unwrap();

        assert_eq!(report.state, InstallState::Done);
        assert_eq!(report.digest, expected);
        assert_eq!(report.stdout, "extracted");
        assert!(report.audit.is_none());

        let entries = h.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, Action::Install);
        assert_eq!(entries[0].hash.as_ref(), Some(&expected));
        assert_eq!(entries[0].artifact.as_deref(), Some("pkg.tgz"));
        assert_eq!(entries[0].policy.as_deref(), Some("mock-policy"));
    }

    #[test]
    fn hash_mismatch_never_reaches_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let wrong = digest_bytes(b"something else");
        let h = harness(true, 0, 0);

        let err = h
            .pipeline
            .install(&request(path, Some(wrong), signature_options()))
            .unwrap_err();

        assert!(matches!(err, SealpackError::HashMismatch { .. }));
        assert!(h.extract_calls.lock().unwrap().is_empty());
        assert_eq!(*h.verify_calls.lock().unwrap(), 0);
        assert!(h.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn unset_signature_option_skips_verifier() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let h = harness(false, 0, 0);

        let report = h
            .pipeline
            .install(&request(path, None, InstallOptions::default()))
            .unwrap();

        assert_eq!(*h.verify_calls.lock().unwrap(), 0);
        assert_eq!(report.signature, SignatureCheck::Skipped);
    }

    #[test]
    fn valid_signature_is_marked_verified() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let h = harness(true, 0, 0);

        let report = h
            .pipeline
            .install(&request(path, None, signature_options()))
            .unwrap();

        assert_eq!(*h.verify_calls.lock().unwrap(), 1);
        assert_eq!(report.signature, SignatureCheck::Verified);
    }

    #[test]
    fn invalid_signature_aborts_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let h = harness(false, 0, 0);

        let err = h
            .pipeline
            .install(&request(path, None, signature_options()))
            .unwrap_err();

        assert!(matches!(err, SealpackError::SignatureVerification { .. }));
        assert!(h.extract_calls.lock().unwrap().is_empty());
        assert!(h.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn nonzero_extraction_exit_is_extraction_error_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let h = harness(true, 2, 0);

        let err = h
            .pipeline
            .install(&request(path, None, InstallOptions::default()))
            .unwrap_err();

        match err {
            SealpackError::Extraction {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 2);
                assert!(stderr.contains("unexpected EOF"));
            }
            other => panic!("expected Extraction, got {:?}", other),
        }
        assert!(h.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(true, 0, 0);

        let err = h
            .pipeline
            .install(&request(dir.path().join("absent.tgz"), None, InstallOptions::default()))
            .unwrap_err();

        assert!(matches!(err, SealpackError::NotFound { .. }));
        assert!(h.extract_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn audit_gate_runs_only_when_threshold_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let h = harness(true, 0, 5);

        h.pipeline
            .install(&request(path.clone(), None, InstallOptions::default()))
            .unwrap();
        assert_eq!(h.audit_calls(), 0);

        let options = InstallOptions {
            max_risk_score: Some(10),
            ..Default::default()
        };
        let req = request(path, None, options);
        let report = h.pipeline.install(&req).unwrap();
        assert_eq!(h.audit_calls(), 1);
        assert_eq!(report.audit.unwrap().score, 5);
        assert_eq!(h.audit_roots.lock().unwrap()[0], req.output_dir.join("package"));
    }

    #[test]
    fn audit_score_above_threshold_aborts_without_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let h = harness(true, 0, 25);

        let options = InstallOptions {
            max_risk_score: Some(10),
            ..Default::default()
        };
        let err = h.pipeline.install(&request(path, None, options)).unwrap_err();

        assert!(matches!(
            err,
            SealpackError::RiskThresholdExceeded {
                score: 25,
                threshold: 10
            }
        ));
        assert!(h.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn extractor_sees_the_staged_copy_that_was_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let expected = digest_bytes(b"not really a tarball");
        // The signer step replaces the original file after the digest gate.
        let h = harness_swapping(true, 0, 0, Some(path.clone()));

        let report = h
            .pipeline
            .install(&request(path.clone(), Some(expected.clone()), signature_options()))
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"malicious replacement");
        let calls = h.extract_calls.lock().unwrap();
        assert_ne!(calls[0], path);
        assert_eq!(calls[0].file_name().unwrap(), "pkg.tgz");
        assert_eq!(h.extracted_bytes.lock().unwrap()[0], b"not really a tarball");
        assert_eq!(report.digest, expected);
        assert_eq!(report.artifact, path);
    }
}
