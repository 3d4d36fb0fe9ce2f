//! Process-spawning runner.

use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{CommandRunner, ExitStatus, ProcessError, ProcessOutput};
use crate::command::ExternalCommand;

/// Runs commands as local child processes with captured output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(
        &self,
        command: &ExternalCommand,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError> {
        debug!(label = command.label(), "spawning: {}", command.shell_line());
        let started = Instant::now();
        let mut process = Command::new(command.program());
        process
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = process.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ProcessError::NotFound(command.program().to_string())
            } else {
                ProcessError::Spawn {
                    command: command.label().to_string(),
                    source,
                }
            }
        })?;

        // Dropping the wait future on timeout drops the child, which
        // kill_on_drop then terminates.
        let waited = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Ok(ProcessOutput {
                        status: ExitStatus::TimedOut,
                        stdout: String::new(),
                        stderr: String::new(),
                        duration: started.elapsed(),
                    });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|source| ProcessError::Io {
            command: command.label().to_string(),
            source,
        })?;

        let status = classify(&output.status);
        trace!(label = command.label(), ?status, "command finished");
        Ok(ProcessOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        })
    }
}

fn classify(status: &std::process::ExitStatus) -> ExitStatus {
    if status.success() {
        return ExitStatus::Success;
    }
    if let Some(code) = status.code() {
        return ExitStatus::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitStatus::Signal(signal);
        }
    }
    ExitStatus::Code(-1)
}
