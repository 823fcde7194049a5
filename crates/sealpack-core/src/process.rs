//! Bounded subprocess execution.
//!
//! Every external tool (container runtime, signer binary, package manager)
//! runs through `run_with_timeout`. Both output streams are drained on
//! background threads so a chatty child cannot deadlock on a full pipe, and
//! both are returned in full.

use std::{
    io::{ErrorKind, Read},
    process::{Command, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use sealpack_contracts::{
    error::{SealpackError, SealpackResult},
    sandbox::ExecOutput,
};

/// Exit code reported when the child was terminated by a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// Run `program args…` and wait at most `timeout`.
///
/// The deadline covers both the child's exit and the end of its output
/// streams, so a grandchild that keeps a pipe open cannot hold the caller.
/// `operation` names the step in `Timeout` errors and logs.
///
/// # Errors
///
/// - `ExternalTool` if the program cannot be spawned.
/// - `Timeout` if it does not exit, or its streams do not close, in time.
///   A child still running is killed first.
pub fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    operation: &str,
) -> SealpackResult<ExecOutput> {
    debug!(program, ?args, timeout_secs = timeout.as_secs(), operation, "spawning subprocess");
    let deadline = Instant::now() + timeout;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SealpackError::ExternalTool {
            tool: program.to_string(),
            reason: if e.kind() == ErrorKind::NotFound {
                "executable not found on PATH".to_string()
            } else {
                e.to_string()
            },
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let timed_out = || SealpackError::Timeout {
        operation: operation.to_string(),
        seconds: timeout.as_secs(),
    };

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!(program, operation, "subprocess exceeded timeout, killing");
            let _ = child.kill();
            let _ = child.wait();
            return Err(timed_out());
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SealpackError::ExternalTool {
                tool: program.to_string(),
                reason: format!("failed waiting for process: {}", e),
            });
        }
    };

    let stdout = collect(stdout, deadline);
    let stderr = collect(stderr, deadline);
    let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
        warn!(program, operation, "subprocess output still open at deadline");
        return Err(timed_out());
    };

    Ok(ExecOutput {
        exit_code: status.code().unwrap_or(SIGNALLED_EXIT_CODE),
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Option<Receiver<String>> {
    stream.map(|mut s| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = s.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// `None` if the stream is still open at `deadline`.
fn collect(stream: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = stream else {
        return Some(String::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}
