//! `Signer` backed by an external binary such as `cosign`.
//!
//! Each operation renders an argument template from `SignerSettings`,
//! substituting `{artifact}`, `{key}`, `{signature}`, `{pubkey}` and `{dir}`
//! per argument. Values are passed as discrete argv entries, never through a
//! shell.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use sealpack_contracts::{
    error::{SealpackError, SealpackResult},
    sandbox::ExecOutput,
};
use sealpack_core::{
    config::SignerSettings,
    process::run_with_timeout,
    traits::{KeyPairPaths, Signer},
};

use crate::signature_path;

#[derive(Debug, Clone)]
pub struct CommandSigner {
    settings: SignerSettings,
}

#[derive(Default)]
struct Placeholders<'a> {
    artifact: Option<&'a Path>,
    key: Option<&'a Path>,
    signature: Option<&'a Path>,
    pubkey: Option<&'a Path>,
    dir: Option<&'a Path>,
}

impl CommandSigner {
    pub fn new(settings: SignerSettings) -> Self {
        Self { settings }
    }

    fn run(
        &self,
        template: &[String],
        values: &Placeholders<'_>,
        operation: &str,
    ) -> SealpackResult<ExecOutput> {
        let args = render(template, values);
        run_with_timeout(
            &self.settings.program,
            &args,
            Duration::from_secs(self.settings.timeout_secs),
            operation,
        )
    }

    fn failed(&self, output: &ExecOutput) -> SealpackError {
        SealpackError::ExternalTool {
            tool: self.settings.program.clone(),
            reason: format!(
                "exited with code {}: {}",
                output.exit_code,
                output.stderr.trim()
            ),
        }
    }
}

impl Signer for CommandSigner {
    fn name(&self) -> &str {
        &self.settings.program
    }

    fn generate_keypair(&self, dir: &Path) -> SealpackResult<KeyPairPaths> {
        std::fs::create_dir_all(dir).map_err(|e| SealpackError::io(dir, e))?;
        let values = Placeholders {
            dir: Some(dir),
            ..Default::default()
        };
        let output = self.run(&self.settings.keygen_args, &values, "keygen")?;
        if !output.success() {
            return Err(self.failed(&output));
        }

        let paths = KeyPairPaths {
            private_key: dir.join(&self.settings.private_key_file),
            public_key: dir.join(&self.settings.public_key_file),
        };
        for path in [&paths.private_key, &paths.public_key] {
            if !path.is_file() {
                return Err(SealpackError::ExternalTool {
                    tool: self.settings.program.clone(),
                    reason: format!("keygen did not produce '{}'", path.display()),
                });
            }
        }
        info!(program = %self.settings.program, dir = %dir.display(), "generated key pair");
        Ok(paths)
    }

    fn sign(&self, artifact: &Path, key: &Path) -> SealpackResult<PathBuf> {
        require(artifact, "artifact")?;
        require(key, "private key")?;

        let out = signature_path(artifact);
        let values = Placeholders {
            artifact: Some(artifact),
            key: Some(key),
            signature: Some(&out),
            ..Default::default()
        };
        let output = self.run(&self.settings.sign_args, &values, "sign")?;
        if !output.success() {
            return Err(self.failed(&output));
        }
        if !out.is_file() {
            return Err(SealpackError::ExternalTool {
                tool: self.settings.program.clone(),
                reason: format!("no signature written to '{}'", out.display()),
            });
        }
        Ok(out)
    }

    /// True iff the verifier exits 0.
    fn verify(&self, artifact: &Path, signature: &Path, public_key: &Path) -> SealpackResult<bool> {
        require(artifact, "artifact")?;
        require(signature, "signature")?;
        require(public_key, "public key")?;

        let values = Placeholders {
            artifact: Some(artifact),
            signature: Some(signature),
            pubkey: Some(public_key),
            ..Default::default()
        };
        let output = self.run(&self.settings.verify_args, &values, "verify")?;
        if !output.success() {
            debug!(
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "external verifier rejected signature"
            );
        }
        Ok(output.success())
    }
}

fn require(path: &Path, what: &str) -> SealpackResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(SealpackError::not_found(what, path))
    }
}

fn render(template: &[String], values: &Placeholders<'_>) -> Vec<String> {
    let subs = [
        ("{artifact}", values.artifact),
        ("{key}", values.key),
        ("{signature}", values.signature),
        ("{pubkey}", values.pubkey),
        ("{dir}", values.dir),
    ];
    template
        .iter()
        .map(|arg| {
            subs.iter().fold(arg.clone(), |acc, (placeholder, value)| match value {
                Some(v) => acc.replace(placeholder, &v.display().to_string()),
                None => acc,
            })
        })
        .collect()
}
