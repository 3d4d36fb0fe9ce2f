//! Pipeline error taxonomy.
//!
//! Three failure classes matter to operators: configuration problems caught
//! before any command runs, external tool failures reported at a stage
//! barrier, and stage-ordering violations. The binary wraps these with
//! `anyhow` context; library callers match on the variants.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::command::CommandError;
use crate::pipeline::Stage;

/// One failed command inside an aborted batch.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Command label, e.g. `register slice 0065 -> 0064`.
    pub label: String,
    /// Exit classification, with a stderr excerpt when one was captured.
    pub detail: String,
}

/// Errors surfaced by the alignment pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or out-of-domain input, detected before anything executes.
    #[error("configuration error: {0}")]
    Config(String),

    /// Command construction rejected a parameter.
    #[error(transparent)]
    Parameter(#[from] CommandError),

    /// Raw input slices missing during the pre-flight check.
    #[error("missing input slices: {}", format_paths(.0))]
    MissingInputs(Vec<PathBuf>),

    /// One or more commands in a stage batch failed. The stage is aborted
    /// and later stages are not attempted.
    #[error("{stage} aborted, {} command(s) failed: {}", .failures.len(), summarize(.failures))]
    Batch {
        stage: Stage,
        failures: Vec<BatchFailure>,
    },

    /// A stage was requested while an earlier, non-skipped stage had not
    /// completed.
    #[error("cannot run {stage}: {unmet} has not completed")]
    DependencyViolation { stage: Stage, unmet: Stage },

    /// Filesystem setup around the work directory failed.
    #[error("workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// Convenience constructor for configuration failures.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn summarize(failures: &[BatchFailure]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = failures
        .iter()
        .take(SHOWN)
        .map(|f| f.label.clone())
        .collect();
    if failures.len() > SHOWN {
        parts.push(format!("and {} more", failures.len() - SHOWN));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_error_names_the_stage_and_the_failed_pairs() {
        let err = PipelineError::Batch {
            stage: Stage::Transforms,
            failures: vec![BatchFailure {
                label: "register slice 0065 -> 0064".into(),
                detail: "exit code 1".into(),
            }],
        };
        let text = err.to_string();
        assert!(text.contains("transform computation"));
        assert!(text.contains("0065"));
        assert!(text.contains("0064"));
    }

    #[test]
    fn long_failure_lists_are_truncated() {
        let failures = (0..10)
            .map(|i| BatchFailure {
                label: format!("reslice gray {i:04}"),
                detail: "exit code 1".into(),
            })
            .collect();
        let err = PipelineError::Batch {
            stage: Stage::Reslice,
            failures,
        };
        assert!(err.to_string().contains("and 7 more"));
    }

    #[test]
    fn dependency_violation_names_both_stages() {
        let err = PipelineError::DependencyViolation {
            stage: Stage::Volumes,
            unmet: Stage::Reslice,
        };
        let text = err.to_string();
        assert!(text.contains("volume assembly"));
        assert!(text.contains("reslicing"));
    }
}
