//! JSON execution report.
//!
//! A machine-readable record of one run: when it started and finished, how
//! it ended, and the per-command outcomes of every stage batch. Written
//! after the run regardless of success, so an aborted run still documents
//! which commands failed.

use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::executor::BatchReport;
use crate::pipeline::StageStatus;

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `completed`, `dry-run`, or `aborted: <cause>`.
    pub outcome: String,
    pub stages: Vec<StageReport>,
}

/// One stage's record inside an [`ExecutionReport`].
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub status: StageStatus,
    pub batches: Vec<BatchReport>,
}

impl ExecutionReport {
    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("writing execution report to {}", path.display()))?;
        Ok(())
    }
}
