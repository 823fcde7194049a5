//! # sealpack-sandbox
//!
//! Sandboxed extraction of untrusted archives.
//!
//! `SandboxOrchestrator` builds a fresh `SandboxPolicy` per extraction
//! (read-only root filesystem, no network, all capabilities dropped,
//! non-root user, memory/CPU/PID ceilings, bounded runtime) and drives a
//! `SandboxRuntime` to unpack the artifact. `DockerRuntime` is the shipped
//! runtime.

pub mod docker;
pub mod orchestrator;

pub use docker::{docker_args, DockerRuntime};
pub use orchestrator::SandboxOrchestrator;
