//! Sandboxed archive extraction.
//!
//! The artifact's directory is mounted read-only at `/input` and the output
//! directory read-write at `/output`; nothing else from the host is visible.
//! File names reach the shell only as positional arguments, never spliced
//! into the script text.
//!
//! Archives are only ever unpacked into an absent or empty
//! `<output_dir>/package`, so that directory never mixes files from an
//! earlier or failed run with the current artifact.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use sealpack_contracts::{
    error::{SealpackError, SealpackResult},
    sandbox::{ExecOutput, Mount, PolicyOverrides, SandboxPolicy},
};
use sealpack_core::traits::{Extractor, SandboxRuntime};

pub const INPUT_MOUNT: &str = "/input";
pub const OUTPUT_MOUNT: &str = "/output";
/// Directory inside `/output` that receives the archive contents.
pub const TARGET_DIR: &str = "package";

const EXTRACT_SCRIPT: &str = r#"set -eu
mkdir -p "$1"
tar -xzf "$2" -C "$1""#;

/// Drives a `SandboxRuntime` to extract artifacts.
pub struct SandboxOrchestrator {
    runtime: Box<dyn SandboxRuntime>,
}

impl SandboxOrchestrator {
    pub fn new(runtime: Box<dyn SandboxRuntime>) -> Self {
        Self { runtime }
    }

    /// Extract `artifact` into `output_dir/package` under `policy`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `artifact` is not a file.
    /// - `Io` if `output_dir` cannot be created or resolved, or if
    ///   `output_dir/package` already holds files.
    /// - Whatever the runtime returns for an unavailable or hung sandbox.
    ///
    /// A non-zero exit code is returned in `ExecOutput`, not as an error.
    pub fn extract_with_policy(
        &self,
        artifact: &Path,
        output_dir: &Path,
        policy: &SandboxPolicy,
    ) -> SealpackResult<ExecOutput> {
        if !artifact.is_file() {
            return Err(SealpackError::not_found("artifact", artifact));
        }
        let artifact = fs::canonicalize(artifact).map_err(|e| SealpackError::io(artifact, e))?;
        let (input_dir, file_name) = split_artifact(&artifact)?;

        fs::create_dir_all(output_dir).map_err(|e| SealpackError::io(output_dir, e))?;
        let output_dir =
            fs::canonicalize(output_dir).map_err(|e| SealpackError::io(output_dir, e))?;
        require_fresh_target(&output_dir.join(TARGET_DIR))?;

        let mounts = vec![
            Mount {
                host: input_dir,
                container: INPUT_MOUNT.to_string(),
                read_only: true,
            },
            Mount {
                host: output_dir.clone(),
                container: OUTPUT_MOUNT.to_string(),
                read_only: false,
            },
        ];
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            EXTRACT_SCRIPT.to_string(),
            "sh".to_string(),
            format!("{}/{}", OUTPUT_MOUNT, TARGET_DIR),
            format!("{}/{}", INPUT_MOUNT, file_name),
        ];

        let output = self.runtime.run(policy, &mounts, &command)?;

        if output.success() {
            info!(
                artifact = %artifact.display(),
                output_dir = %output_dir.display(),
                runtime = self.runtime.name(),
                "sandboxed extraction finished"
            );
        } else {
            warn!(
                artifact = %artifact.display(),
                exit_code = output.exit_code,
                "sandboxed extraction exited non-zero; output directory is untrusted"
            );
        }
        Ok(output)
    }
}

impl Extractor for SandboxOrchestrator {
    fn extract(
        &self,
        artifact: &Path,
        output_dir: &Path,
        overrides: &PolicyOverrides,
    ) -> SealpackResult<(String, ExecOutput)> {
        let policy = SandboxPolicy::build(overrides);
        let output = self.extract_with_policy(artifact, output_dir, &policy)?;
        Ok((policy.summary(), output))
    }

    fn extracted_root(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(TARGET_DIR)
    }
}

fn require_fresh_target(target: &Path) -> SealpackResult<()> {
    let occupied = match fs::read_dir(target) {
        Ok(mut entries) => entries.next().is_some(),
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(SealpackError::io(target, e)),
    };
    if occupied {
        return Err(SealpackError::Io {
            path: target.display().to_string(),
            reason: "already holds an extraction; remove it or choose another output directory"
                .to_string(),
        });
    }
    Ok(())
}

fn split_artifact(artifact: &Path) -> SealpackResult<(PathBuf, String)> {
    let parent = artifact.parent().map(Path::to_path_buf);
    let name = artifact.file_name().map(|n| n.to_string_lossy().into_owned());
    match (parent, name) {
        (Some(p), Some(n)) => Ok((p, n)),
        _ => Err(SealpackError::not_found("artifact", artifact)),
    }
}
