//! Capability traits at the pipeline's trust boundary.
//!
//! - `Signer`            — key generation, signing, and signature verification
//! - `SandboxRuntime`    — runs a command under an isolation policy
//! - `Extractor`         — unpacks an artifact into an output directory
//! - `PackageAuditor`    — static scan of an extracted tree
//! - `TransparencySink`  — append-only record of completed operations
//! - `PackageSource`     — resolves a package spec to a local tarball
//! - `Summarizer`        — optional external summarization service
//!
//! The pipeline depends only on these traits. Concrete implementations live
//! in the sibling crates (`sealpack-sign`, `sealpack-sandbox`,
//! `sealpack-audit`, `sealpack-log`) or in the CLI.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use sealpack_contracts::{
    audit::AuditReport,
    digest::Digest,
    error::SealpackResult,
    log::LogEntry,
    sandbox::{ExecOutput, Mount, PolicyOverrides, SandboxPolicy},
};

/// Paths of a freshly generated key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Cryptographic signing capability.
///
/// The pipeline only ever calls `verify`. `sign` and `generate_keypair` back
/// the `sign` and `keygen` commands.
pub trait Signer: Send + Sync {
    /// Short identifier used in logs and `doctor` output.
    fn name(&self) -> &str;

    /// Create a new key pair under `dir`.
    fn generate_keypair(&self, dir: &Path) -> SealpackResult<KeyPairPaths>;

    /// Sign `artifact` with the private key at `key`.
    ///
    /// Returns the path of the written detached signature.
    fn sign(&self, artifact: &Path, key: &Path) -> SealpackResult<PathBuf>;

    /// Check `signature` over `artifact` against `public_key`.
    ///
    /// `Ok(false)` means the signature is well-formed input that does not
    /// verify. Missing files are `Err(NotFound)`.
    fn verify(&self, artifact: &Path, signature: &Path, public_key: &Path) -> SealpackResult<bool>;
}

/// Container or other isolation runtime.
pub trait SandboxRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Run `command` under `policy` with `mounts`.
    ///
    /// A non-zero exit code is a normal `Ok` result. `Err` is reserved for
    /// the runtime itself being unavailable or timing out.
    fn run(
        &self,
        policy: &SandboxPolicy,
        mounts: &[Mount],
        command: &[String],
    ) -> SealpackResult<ExecOutput>;
}

/// Unpacks an artifact into a directory.
pub trait Extractor: Send + Sync {
    /// Extract `artifact` into `output_dir`.
    ///
    /// Returns the policy summary that was applied alongside the process
    /// output. Non-zero exit codes are returned, not raised.
    fn extract(
        &self,
        artifact: &Path,
        output_dir: &Path,
        overrides: &PolicyOverrides,
    ) -> SealpackResult<(String, ExecOutput)>;

    /// Directory under `output_dir` that holds exactly the unpacked files.
    fn extracted_root(&self, output_dir: &Path) -> PathBuf {
        output_dir.to_path_buf()
    }
}

/// Static risk scanner over a file tree.
pub trait PackageAuditor: Send + Sync {
    fn scan(&self, root: &Path) -> SealpackResult<AuditReport>;
}

/// Append target for completed operations.
pub trait TransparencySink: Send + Sync {
    /// Append one entry and return the new Merkle root.
    ///
    /// A failed append is fatal to the operation being recorded.
    fn append(&self, entry: LogEntry) -> SealpackResult<Digest>;
}

/// One log shared by several pipelines.
impl<T: TransparencySink + ?Sized> TransparencySink for Arc<T> {
    fn append(&self, entry: LogEntry) -> SealpackResult<Digest> {
        (**self).append(entry)
    }
}

/// Resolves a package spec (path, registry name, …) to a local tarball.
pub trait PackageSource: Send + Sync {
    fn resolve(&self, spec: &str, workdir: &Path) -> SealpackResult<PathBuf>;
}

/// External text summarization service.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, prompt: &str, api_key: &str) -> SealpackResult<String>;
}
