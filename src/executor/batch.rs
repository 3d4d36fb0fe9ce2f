//! Bounded-concurrency batch execution.
//!
//! A batch is a set of independent commands belonging to one pipeline step.
//! All of them are dispatched together under a semaphore that caps how many
//! run at once; the batch completes when every command has finished,
//! successfully or not. Acting on failures is the scheduler's job, so the
//! report carries one entry per command in submission order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{CommandRunner, ProcessOutput};
use crate::command::ExternalCommand;

/// Outcome of one command inside a batch.
#[derive(Debug, Clone, Serialize)]
pub struct CommandStatus {
    pub label: String,
    pub success: bool,
    /// Exit classification with a stderr excerpt; empty on success.
    pub detail: String,
    pub duration_ms: u64,
}

/// Outcome of one batch, entries in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub label: String,
    pub commands: Vec<CommandStatus>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.commands.iter().all(|c| c.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CommandStatus> {
        self.commands.iter().filter(|c| !c.success)
    }
}

/// Dispatches command batches with a concurrency bound.
pub struct BatchExecutor {
    runner: Arc<dyn CommandRunner>,
    jobs: usize,
    command_timeout: Option<Duration>,
    show_progress: bool,
}

impl BatchExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, jobs: usize) -> Self {
        Self {
            runner,
            jobs: jobs.max(1),
            command_timeout: None,
            show_progress: false,
        }
    }

    /// Per-command wall clock limit.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Draw a progress bar while a batch runs.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Number of commands the executor admits at once.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every command of `label` to completion and report each outcome.
    pub async fn execute(&self, label: &str, commands: Vec<ExternalCommand>) -> BatchReport {
        let total = commands.len();
        debug!("dispatching {total} command(s) for {label}");
        let progress = if self.show_progress && total > 0 {
            create_progress_bar(label, total)
        } else {
            ProgressBar::hidden()
        };

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut futures = Vec::new();
        for command in &commands {
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            let future = async move {
                let _permit = semaphore.acquire().await.unwrap();
                let status = self.run_one(command).await;
                progress.inc(1);
                status
            };
            futures.push(future);
        }
        let statuses = join_all(futures).await;
        progress.finish_and_clear();

        let report = BatchReport {
            label: label.to_string(),
            commands: statuses,
        };
        let failed = report.failures().count();
        if failed > 0 {
            warn!("{failed} of {total} command(s) failed in {label}");
        }
        report
    }

    async fn run_one(&self, command: &ExternalCommand) -> CommandStatus {
        let label = command.label().to_string();
        match self.runner.run(command, self.command_timeout).await {
            Ok(output) if output.success() => CommandStatus {
                label,
                success: true,
                detail: String::new(),
                duration_ms: output.duration.as_millis() as u64,
            },
            Ok(output) => {
                let detail = failure_detail(&output);
                warn!("{label}: {detail}");
                CommandStatus {
                    label,
                    success: false,
                    detail,
                    duration_ms: output.duration.as_millis() as u64,
                }
            }
            Err(error) => {
                warn!("{label}: {error}");
                CommandStatus {
                    label,
                    success: false,
                    detail: error.to_string(),
                    duration_ms: 0,
                }
            }
        }
    }
}

fn create_progress_bar(label: &str, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap()
            .progress_chars("█▓▒░ "),
    );
    pb.set_message(label.to_string());
    pb
}

fn failure_detail(output: &ProcessOutput) -> String {
    let mut detail = output.status.to_string();
    if let Some(line) = output.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
        detail.push_str(": ");
        detail.push_str(line.trim());
    }
    detail
}
