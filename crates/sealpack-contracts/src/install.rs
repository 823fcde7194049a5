//! Install request and result types.
//!
//! `InstallRequest` is what a caller hands to the pipeline. `InstallReport`
//! is returned only when every gate passed; any failure is an `Err`.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{audit::AuditReport, digest::Digest, sandbox::PolicyOverrides};

/// States of one installation.
///
/// `Aborted` is never stored in a report: the pipeline returns `Err` on the
/// transition into it. It exists so progress logging can name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallState {
    Start,
    Hashed,
    SignatureChecked,
    Extracted,
    Audited,
    Done,
    Aborted,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallState::Start => "START",
            InstallState::Hashed => "HASHED",
            InstallState::SignatureChecked => "SIGNATURE_CHECKED",
            InstallState::Extracted => "EXTRACTED",
            InstallState::Audited => "AUDITED",
            InstallState::Done => "DONE",
            InstallState::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// Detached signature plus the public key to check it against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMaterial {
    pub signature: PathBuf,
    pub public_key: PathBuf,
}

/// Knobs for one installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOptions {
    /// When `Some`, the signature is verified before extraction. When
    /// `None`, verification is skipped and the report says so.
    pub signature: Option<SignatureMaterial>,

    /// When `Some`, the extracted tree is audited and the install fails if
    /// the score exceeds this value.
    pub max_risk_score: Option<u64>,

    pub sandbox: PolicyOverrides,
}

/// Everything the pipeline needs to install one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    pub artifact: PathBuf,
    pub expected_digest: Option<Digest>,
    pub output_dir: PathBuf,
    pub options: InstallOptions,
}

/// Whether signature verification ran.
///
/// `Skipped` is distinct from `Verified` so a caller can never mistake an
/// unchecked artifact for a checked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureCheck {
    Verified,
    Skipped,
}

/// Successful outcome of an installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub state: InstallState,
    pub artifact: PathBuf,
    pub digest: Digest,
    pub signature: SignatureCheck,
    pub output_dir: PathBuf,
    /// Captured stdout of the sandboxed extraction.
    pub stdout: String,
    /// Present only when an audit gate was configured.
    pub audit: Option<AuditReport>,
    /// Transparency log root after the install entry was appended.
    pub merkle_root: Digest,
}
