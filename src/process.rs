//! Child-process invocation shared by the macOS and Linux backends.
//!
//! Backends talk to a [`CommandRunner`] rather than `std::process` directly so
//! tests can substitute captured tool output for real subprocesses.

use crate::error::ValidationError;
use std::ffi::OsStr;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of one finished tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Process exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        ToolOutput {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        text
    }

    /// The diagnostic a failed run should surface: trimmed stderr, or the
    /// exit code when the tool printed nothing.
    pub fn failure_message(&self, program: &str) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("{program} exited with status {}", self.exit_code)
        } else {
            stderr.to_string()
        }
    }

    fn from_parts(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        ToolOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }
}

impl From<Output> for ToolOutput {
    fn from(output: Output) -> Self {
        ToolOutput::from_parts(output.status, &output.stdout, &output.stderr)
    }
}

/// Runs an external program to completion and captures its output.
pub trait CommandRunner: Send + Sync {
    /// Fails only when the program could not be started or waited on. A
    /// nonzero exit is a successful run with a nonzero `exit_code`.
    fn run(&self, program: &str, args: &[&OsStr]) -> Result<ToolOutput, ValidationError>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill children that run longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        SystemRunner { timeout }
    }

    fn wait_with_deadline(
        &self,
        program: &str,
        command: &mut Command,
        limit: Duration,
    ) -> Result<ToolOutput, ValidationError> {
        let mut child = command
            .spawn()
            .map_err(|e| ValidationError::tool(program, e.to_string()))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let deadline = Instant::now() + limit;

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    abandon(&mut child);
                    warn!(program, ?limit, "tool timed out, killed");
                    return Err(ValidationError::tool(
                        program,
                        format!("timed out after {limit:?}"),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    abandon(&mut child);
                    return Err(ValidationError::tool(program, e.to_string()));
                }
            }
        };

        Ok(ToolOutput::from_parts(status, &collect(stdout), &collect(stderr)))
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&OsStr]) -> Result<ToolOutput, ValidationError> {
        debug!(program, ?args, "invoking verification tool");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match self.timeout {
            Some(limit) => self.wait_with_deadline(program, &mut command, limit),
            None => command
                .output()
                .map(ToolOutput::from)
                .map_err(|e| ValidationError::tool(program, e.to_string())),
        };

        match &output {
            Ok(out) => debug!(program, exit_code = out.exit_code, "tool finished"),
            Err(e) => warn!(program, error = %e, "tool invocation failed"),
        }
        output
    }
}

// Pipes are drained on their own threads so a chatty child cannot block on a
// full pipe while we poll for its exit.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Kills and reaps a child we have given up on. Its reader threads are left
/// detached: they finish once every process holding the pipes has closed
/// them, which for a grandchild may be after this call returns.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
