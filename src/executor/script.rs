//! Scripted runner for tests and offline inspection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandRunner, ExitStatus, ProcessError, ProcessOutput};
use crate::command::ExternalCommand;

struct Script {
    needle: String,
    status: ExitStatus,
    stderr: String,
}

/// Runner that answers from a script instead of spawning processes.
///
/// Commands succeed unless a failure rule matches their label. Every call
/// is recorded, so tests can assert which commands a pipeline produced and
/// in which stage order.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<Vec<Script>>,
    history: Mutex<Vec<ExternalCommand>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artificial latency per command, to surface concurrency in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every command whose label contains `needle`, with `stderr` as
    /// the captured error text.
    pub fn fail_matching(&self, needle: impl Into<String>, stderr: impl Into<String>) {
        self.fail_matching_with(needle, ExitStatus::Code(1), stderr);
    }

    /// Fail with an explicit exit classification.
    pub fn fail_matching_with(
        &self,
        needle: impl Into<String>,
        status: ExitStatus,
        stderr: impl Into<String>,
    ) {
        self.scripts.lock().unwrap().push(Script {
            needle: needle.into(),
            status,
            stderr: stderr.into(),
        });
    }

    /// Every command run so far, in completion order.
    pub fn history(&self) -> Vec<ExternalCommand> {
        self.history.lock().unwrap().clone()
    }

    /// Labels of every command run so far.
    pub fn labels(&self) -> Vec<String> {
        self.history()
            .iter()
            .map(|c| c.label().to_string())
            .collect()
    }

    /// Programs of every command run so far.
    pub fn programs(&self) -> Vec<String> {
        self.history()
            .iter()
            .map(|c| c.program().to_string())
            .collect()
    }

    /// Highest number of commands that were ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &ExternalCommand,
        _timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.history.lock().unwrap().push(command.clone());

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .iter()
            .find(|s| command.label().contains(&s.needle))
            .map(|s| (s.status.clone(), s.stderr.clone()));
        let (status, stderr) = scripted.unwrap_or((ExitStatus::Success, String::new()));
        Ok(ProcessOutput {
            status,
            stdout: String::new(),
            stderr,
            duration: self.delay.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(label: &str) -> ExternalCommand {
        ExternalCommand::new(label, "true", vec![])
    }

    #[tokio::test]
    async fn records_every_command_it_runs() {
        let runner = ScriptedRunner::new();
        runner.run(&command("first"), None).await.unwrap();
        runner.run(&command("second"), None).await.unwrap();
        assert_eq!(runner.labels(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn unmatched_commands_succeed() {
        let runner = ScriptedRunner::new();
        let output = runner.run(&command("register slice 0051 -> 0050"), None).await.unwrap();
        assert!(output.success());
    }

    #[tokio::test]
    async fn matching_commands_fail_with_the_scripted_outcome() {
        let runner = ScriptedRunner::new();
        runner.fail_matching("0065", "registration diverged");
        let output = runner.run(&command("register slice 0065 -> 0064"), None).await.unwrap();
        assert_eq!(output.status, ExitStatus::Code(1));
        assert_eq!(output.stderr, "registration diverged");
        assert!(runner.run(&command("register slice 0064 -> 0063"), None).await.unwrap().success());
    }
}
