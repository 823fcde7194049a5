//! Sandbox isolation policy and execution result types.
//!
//! A `SandboxPolicy` is built once per extraction from defaults plus
//! `PolicyOverrides` and is never mutated afterwards: it has no setters, and
//! the isolation flags that must always hold (read-only root, no network, no
//! capabilities, no privilege escalation) are not overridable at all.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Network mode for the sandbox. Only `None` is constructible via the
/// policy builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    None,
}

/// A minimal-privilege execution policy for one sandboxed run.
///
/// Serialize-only: the sole constructor is `build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxPolicy {
    image: String,
    memory: String,
    cpus: String,
    uid: u32,
    gid: u32,
    pids_limit: u32,
    timeout: Duration,
    read_only_rootfs: bool,
    network: NetworkMode,
    capabilities: Vec<String>,
    no_new_privileges: bool,
}

impl SandboxPolicy {
    /// Default container image.
    pub const DEFAULT_IMAGE: &'static str = "node:20-alpine";
    pub const DEFAULT_MEMORY: &'static str = "256m";
    pub const DEFAULT_CPUS: &'static str = "0.5";
    /// `nobody:nogroup` on most distributions.
    pub const DEFAULT_UID: u32 = 65534;
    pub const DEFAULT_GID: u32 = 65534;
    pub const DEFAULT_PIDS_LIMIT: u32 = 64;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Build a policy from defaults plus `overrides`.
    ///
    /// A UID/GID of 0 in the overrides is ignored: the sandbox never runs
    /// as root.
    pub fn build(overrides: &PolicyOverrides) -> Self {
        let non_root = |id: Option<u32>, default: u32| id.filter(|v| *v != 0).unwrap_or(default);
        Self {
            image: overrides
                .image
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_IMAGE.to_string()),
            memory: overrides
                .memory
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MEMORY.to_string()),
            cpus: overrides
                .cpus
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_CPUS.to_string()),
            uid: non_root(overrides.uid, Self::DEFAULT_UID),
            gid: non_root(overrides.gid, Self::DEFAULT_GID),
            pids_limit: overrides.pids_limit.unwrap_or(Self::DEFAULT_PIDS_LIMIT),
            timeout: Duration::from_secs(
                overrides.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS),
            ),
            read_only_rootfs: true,
            network: NetworkMode::None,
            capabilities: Vec::new(),
            no_new_privileges: true,
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn memory(&self) -> &str {
        &self.memory
    }

    pub fn cpus(&self) -> &str {
        &self.cpus
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn pids_limit(&self) -> u32 {
        self.pids_limit
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn read_only_rootfs(&self) -> bool {
        self.read_only_rootfs
    }

    pub fn network(&self) -> NetworkMode {
        self.network
    }

    /// Capabilities retained inside the sandbox. Always empty.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn no_new_privileges(&self) -> bool {
        self.no_new_privileges
    }

    /// One-line description recorded in the transparency log.
    pub fn summary(&self) -> String {
        format!(
            "image={} memory={} cpus={} user={}:{} network=none rootfs=ro caps=none",
            self.image, self.memory, self.cpus, self.uid, self.gid
        )
    }
}

/// Caller-supplied adjustments to the default policy.
///
/// Only resource ceilings, image, and identity are adjustable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyOverrides {
    pub image: Option<String>,
    pub memory: Option<String>,
    pub cpus: Option<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub pids_limit: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// A host directory exposed inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

/// Exit status and full captured streams of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
