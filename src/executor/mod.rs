//! Asynchronous execution of external commands.
//!
//! [`CommandRunner`] is the seam between command construction and the
//! operating system: the pipeline hands a built
//! [`ExternalCommand`](crate::command::ExternalCommand) to a runner and
//! inspects the classified result. [`LocalRunner`] spawns real processes;
//! [`ScriptedRunner`] substitutes recorded outcomes so the orchestration
//! can be exercised without the registration toolchain installed.

pub mod batch;
pub mod local;
pub mod script;

pub use batch::{BatchExecutor, BatchReport, CommandStatus};
pub use local::LocalRunner;
pub use script::ScriptedRunner;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::command::ExternalCommand;

/// Classified exit of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Exited with a nonzero code.
    Code(i32),
    /// Terminated by a signal.
    Signal(i32),
    /// Wall clock limit exceeded; the process was killed.
    TimedOut,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => f.write_str("succeeded"),
            ExitStatus::Code(code) => write!(f, "exit code {code}"),
            ExitStatus::Signal(signal) => write!(f, "killed by signal {signal}"),
            ExitStatus::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Captured result of one finished command.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Failures that prevented a command from running at all. Commands that
/// started and then failed are reported through [`ExitStatus`] instead.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("command not found: {0}")]
    NotFound(String),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o failure while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Executes one external command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command`, enforcing `timeout` when given.
    ///
    /// A timed out or signaled process is a regular [`ProcessOutput`];
    /// `Err` is reserved for commands that never started.
    async fn run(
        &self,
        command: &ExternalCommand,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_classifies_success() {
        assert!(ExitStatus::Success.success());
        assert!(!ExitStatus::Code(1).success());
        assert!(!ExitStatus::TimedOut.success());
    }

    #[test]
    fn exit_status_display_names_the_cause() {
        assert_eq!(ExitStatus::Code(3).to_string(), "exit code 3");
        assert_eq!(ExitStatus::Signal(9).to_string(), "killed by signal 9");
        assert_eq!(ExitStatus::TimedOut.to_string(), "timed out");
    }
}
