//! Error taxonomy for the sealpack pipeline.
//!
//! All fallible operations return `SealpackResult<T>`. Every variant names the
//! artifact or path it concerns so a fatal path can be reported without
//! additional context from the caller.

use thiserror::Error;

/// The unified error type for sealpack.
#[derive(Debug, Error)]
pub enum SealpackError {
    /// A required artifact, key, signature, or directory does not exist.
    #[error("{what} not found: {path}")]
    NotFound { what: String, path: String },

    /// The computed digest did not equal the expected digest.
    ///
    /// Always fatal and never retried: extraction must not proceed.
    #[error("hash mismatch for '{artifact}': expected {expected}, computed {actual}")]
    HashMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// The signer reported that the signature does not verify.
    #[error("signature verification failed for '{artifact}': {reason}")]
    SignatureVerification { artifact: String, reason: String },

    /// The sandboxed extraction exited non-zero.
    ///
    /// Carries the captured stderr. The output directory must be treated as
    /// untrusted until a fresh run succeeds.
    #[error("extraction of '{artifact}' failed with exit code {exit_code}: {stderr}")]
    Extraction {
        artifact: String,
        exit_code: i32,
        stderr: String,
    },

    /// A file read, write, or rename failed.
    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },

    /// A collaborator tool (signer binary, container runtime, summarizer,
    /// package manager) is unavailable or failed.
    #[error("external tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// A bounded subprocess invocation did not finish in time.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// The static audit of the extracted package scored above the configured
    /// ceiling.
    #[error("audit risk score {score} exceeds threshold {threshold}")]
    RiskThresholdExceeded { score: u64, threshold: u64 },

    /// A configuration document or value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl SealpackError {
    /// Build an `Io` error from a `std::io::Error` and the path it concerns.
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Build a `NotFound` error for `path`.
    pub fn not_found(what: impl Into<String>, path: impl AsRef<std::path::Path>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.as_ref().display().to_string(),
        }
    }
}

/// Convenience alias used throughout the sealpack crates.
pub type SealpackResult<T> = Result<T, SealpackError>;
