//! Docker-backed `SandboxRuntime`.
//!
//! The policy is rendered into `docker run` flags by `docker_args`, which is
//! pure so the exact isolation flags can be tested without a daemon.

use std::{
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, warn};

use sealpack_contracts::{
    error::{SealpackError, SealpackResult},
    sandbox::{ExecOutput, Mount, NetworkMode, SandboxPolicy},
};
use sealpack_core::{process::run_with_timeout, traits::SandboxRuntime};

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs commands in throwaway Docker containers.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: String,
}

impl DockerRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Ask the daemon for its version. Used by `doctor`.
    pub fn probe(&self) -> SealpackResult<String> {
        let args = vec![
            "version".to_string(),
            "--format".to_string(),
            "{{.Server.Version}}".to_string(),
        ];
        let out = run_with_timeout(&self.program, &args, PROBE_TIMEOUT, "docker probe")?;
        if out.success() {
            Ok(out.stdout.trim().to_string())
        } else {
            Err(SealpackError::ExternalTool {
                tool: self.program.clone(),
                reason: out.stderr.trim().to_string(),
            })
        }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl SandboxRuntime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    fn run(
        &self,
        policy: &SandboxPolicy,
        mounts: &[Mount],
        command: &[String],
    ) -> SealpackResult<ExecOutput> {
        let name = container_name();
        let args = docker_args(&name, policy, mounts, command);
        debug!(container = %name, image = %policy.image(), "starting sandbox container");

        match run_with_timeout(&self.program, &args, policy.timeout(), "sandbox extraction") {
            Err(err @ SealpackError::Timeout { .. }) => {
                // Killing the client does not stop the container.
                warn!(container = %name, "sandbox timed out, removing container");
                let rm = vec!["rm".to_string(), "-f".to_string(), name];
                let cleanup =
                    run_with_timeout(&self.program, &rm, CLEANUP_TIMEOUT, "sandbox cleanup");
                if let Err(e) = cleanup {
                    warn!(error = %e, "failed to remove timed-out container");
                }
                Err(err)
            }
            other => other,
        }
    }
}

/// Render `policy`, `mounts`, and `command` as `docker` arguments.
pub fn docker_args(
    name: &str,
    policy: &SandboxPolicy,
    mounts: &[Mount],
    command: &[String],
) -> Vec<String> {
    let mut args: Vec<String> = vec!["run".into(), "--rm".into(), "--name".into(), name.into()];

    if policy.read_only_rootfs() {
        args.push("--read-only".into());
    }
    match policy.network() {
        NetworkMode::None => args.extend(["--network".into(), "none".into()]),
    }
    args.extend(["--cap-drop".into(), "ALL".into()]);
    for cap in policy.capabilities() {
        args.extend(["--cap-add".into(), cap.clone()]);
    }
    if policy.no_new_privileges() {
        args.extend(["--security-opt".into(), "no-new-privileges".into()]);
    }
    args.extend([
        "--user".into(),
        format!("{}:{}", policy.uid(), policy.gid()),
        "--memory".into(),
        policy.memory().to_string(),
        "--memory-swap".into(),
        policy.memory().to_string(),
        "--cpus".into(),
        policy.cpus().to_string(),
        "--pids-limit".into(),
        policy.pids_limit().to_string(),
        "--tmpfs".into(),
        "/tmp:rw,noexec,nosuid,size=64m".into(),
    ]);
    for m in mounts {
        args.extend(["-v".into(), volume_spec(&m.host, &m.container, m.read_only)]);
    }
    args.push(policy.image().to_string());
    args.extend(command.iter().cloned());
    args
}

fn volume_spec(host: &Path, container: &str, read_only: bool) -> String {
    format!(
        "{}:{}:{}",
        host.display(),
        container,
        if read_only { "ro" } else { "rw" }
    )
}

fn container_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("sealpack-{}-{}", std::process::id(), nanos)
}
