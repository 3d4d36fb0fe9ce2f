//! Staged pipeline scheduler.
//!
//! Four stages run in a fixed order: slice preparation, transform
//! computation (partials, then composites), reslicing (grayscale, then
//! color) and volume assembly. Each stage is a barrier: every command of a
//! stage must finish before the next stage starts, a failed command aborts
//! the run at the stage boundary, and a stage flagged as skipped is assumed
//! to have produced its outputs in a previous run over the same work
//! directory.

pub mod plan;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::chain::{AdjacentPairing, ChainResolver, PairingPolicy};
use crate::command::ExternalCommand;
use crate::config::{PipelineOptions, SkipFlags};
use crate::error::{BatchFailure, PipelineError};
use crate::executor::{BatchExecutor, BatchReport, CommandRunner, CommandStatus};
use crate::layout::WorkLayout;
use crate::report::{ExecutionReport, StageReport};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SourceSlices,
    Transforms,
    Reslice,
    Volumes,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::SourceSlices,
        Stage::Transforms,
        Stage::Reslice,
        Stage::Volumes,
    ];

    fn ordinal(self) -> usize {
        match self {
            Stage::SourceSlices => 0,
            Stage::Transforms => 1,
            Stage::Reslice => 2,
            Stage::Volumes => 3,
        }
    }

    fn skipped(self, flags: &SkipFlags) -> bool {
        match self {
            Stage::SourceSlices => flags.slice_generation,
            Stage::Transforms => flags.transforms,
            Stage::Reslice => flags.reslice,
            Stage::Volumes => flags.volumes,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SourceSlices => "source slice generation",
            Stage::Transforms => "transform computation",
            Stage::Reslice => "reslicing",
            Stage::Volumes => "volume assembly",
        };
        f.write_str(name)
    }
}

/// Bookkeeping state of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Skipped,
    Completed,
    Failed,
}

/// Orchestrates one alignment run over a slice range.
pub struct AlignmentPipeline {
    options: PipelineOptions,
    layout: WorkLayout,
    pairing: Arc<dyn PairingPolicy>,
    chains: Arc<dyn ChainResolver>,
    executor: BatchExecutor,
    status: [StageStatus; 4],
    batches: Vec<(Stage, BatchReport)>,
    started_at: DateTime<Utc>,
}

impl AlignmentPipeline {
    /// Validate `options` and assemble a pipeline with the stock adjacency
    /// strategy.
    pub fn new(
        options: PipelineOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, PipelineError> {
        options.validate()?;
        let layout = WorkLayout::from_options(&options);
        let jobs = options.execution.jobs.unwrap_or_else(default_jobs);
        let executor = BatchExecutor::new(runner, jobs)
            .with_timeout(options.execution.command_timeout)
            .with_progress(!options.execution.dry_run);
        let policy = Arc::new(AdjacentPairing::new());
        Ok(Self {
            options,
            layout,
            pairing: policy.clone(),
            chains: policy,
            executor,
            status: [StageStatus::Pending; 4],
            batches: Vec::new(),
            started_at: Utc::now(),
        })
    }

    /// Swap the neighbor selection and chain resolution strategies.
    pub fn with_policies(
        mut self,
        pairing: Arc<dyn PairingPolicy>,
        chains: Arc<dyn ChainResolver>,
    ) -> Self {
        self.pairing = pairing;
        self.chains = chains;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn layout(&self) -> &WorkLayout {
        &self.layout
    }

    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        self.status[stage.ordinal()]
    }

    /// Run every stage in order, honoring skip flags, then write the
    /// execution report when one was requested.
    pub async fn launch(&mut self) -> Result<ExecutionReport, PipelineError> {
        let range = self.options.range;
        info!(
            "aligning slices {}..={} onto reference {}",
            range.start, range.end, range.reference
        );
        if !self.options.execution.dry_run {
            self.layout
                .ensure_dirs()
                .map_err(|source| PipelineError::Workspace {
                    path: self.options.work_dir.clone(),
                    source,
                })?;
            if self.options.execution.check_inputs {
                self.check_inputs()?;
            }
        }

        let outcome = self.run_stages().await;
        let report = self.assemble_report(&outcome);
        if let Some(path) = self.options.execution.report.clone() {
            if let Err(error) = report.write_json(&path) {
                warn!("could not write execution report: {error:#}");
            }
        }
        outcome.map(|_| report)
    }

    async fn run_stages(&mut self) -> Result<(), PipelineError> {
        for stage in Stage::ALL {
            if stage.skipped(&self.options.skip) {
                info!("skipping {stage}");
                self.status[stage.ordinal()] = StageStatus::Skipped;
                continue;
            }
            self.run_stage(stage).await?;
        }
        Ok(())
    }

    /// Run a single stage, enforcing the barrier on everything before it.
    pub async fn run_stage(&mut self, stage: Stage) -> Result<(), PipelineError> {
        self.check_dependencies(stage)?;
        info!("starting {stage}");
        let started = Instant::now();
        let outcome = match stage {
            Stage::SourceSlices => self.run_source_slices().await,
            Stage::Transforms => self.run_transforms().await,
            Stage::Reslice => self.run_reslice().await,
            Stage::Volumes => self.run_volumes().await,
        };
        match outcome {
            Ok(()) => {
                self.status[stage.ordinal()] = StageStatus::Completed;
                info!("{stage} completed in {:.1?}", started.elapsed());
                Ok(())
            }
            Err(error) => {
                self.status[stage.ordinal()] = StageStatus::Failed;
                Err(error)
            }
        }
    }

    fn check_dependencies(&self, stage: Stage) -> Result<(), PipelineError> {
        for prior in Stage::ALL.iter().take(stage.ordinal()).copied() {
            let satisfied = prior.skipped(&self.options.skip)
                || matches!(
                    self.stage_status(prior),
                    StageStatus::Completed | StageStatus::Skipped
                );
            if !satisfied {
                return Err(PipelineError::DependencyViolation {
                    stage,
                    unmet: prior,
                });
            }
        }
        Ok(())
    }

    async fn run_source_slices(&mut self) -> Result<(), PipelineError> {
        let commands = plan::source_slices(&self.options, &self.layout)?;
        self.run_batch(Stage::SourceSlices, "slice preparation", commands)
            .await
    }

    async fn run_transforms(&mut self) -> Result<(), PipelineError> {
        let partials = plan::partial_transforms(&self.options, &self.layout, self.pairing.as_ref())?;
        self.run_batch(Stage::Transforms, "partial transforms", partials)
            .await?;
        let composites =
            plan::composite_transforms(&self.options, &self.layout, self.chains.as_ref())?;
        self.run_batch(Stage::Transforms, "composite transforms", composites)
            .await
    }

    async fn run_reslice(&mut self) -> Result<(), PipelineError> {
        let gray = plan::reslice_gray(&self.options, &self.layout)?;
        self.run_batch(Stage::Reslice, "grayscale reslicing", gray)
            .await?;
        let color = plan::reslice_color(&self.options, &self.layout)?;
        self.run_batch(Stage::Reslice, "color reslicing", color).await
    }

    async fn run_volumes(&mut self) -> Result<(), PipelineError> {
        let commands = plan::volumes(&self.options, &self.layout)?;
        self.run_batch(Stage::Volumes, "volume stacking", commands)
            .await
    }

    async fn run_batch(
        &mut self,
        stage: Stage,
        label: &str,
        commands: Vec<ExternalCommand>,
    ) -> Result<(), PipelineError> {
        if self.options.execution.dry_run {
            for command in &commands {
                println!("{}", command.shell_line());
            }
            let statuses = commands
                .iter()
                .map(|c| CommandStatus {
                    label: c.label().to_string(),
                    success: true,
                    detail: String::new(),
                    duration_ms: 0,
                })
                .collect();
            self.batches.push((
                stage,
                BatchReport {
                    label: label.to_string(),
                    commands: statuses,
                },
            ));
            return Ok(());
        }

        let report = self.executor.execute(label, commands).await;
        let failures: Vec<BatchFailure> = report
            .failures()
            .map(|c| BatchFailure {
                label: c.label.clone(),
                detail: c.detail.clone(),
            })
            .collect();
        self.batches.push((stage, report));
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Batch { stage, failures })
        }
    }

    fn check_inputs(&self) -> Result<(), PipelineError> {
        let missing: Vec<PathBuf> = self
            .options
            .range
            .iter()
            .map(|index| self.layout.raw_slice(index))
            .filter(|path| !path.is_file())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::MissingInputs(missing))
        }
    }

    fn assemble_report(&self, outcome: &Result<(), PipelineError>) -> ExecutionReport {
        let outcome_text = match outcome {
            Ok(()) if self.options.execution.dry_run => "dry-run".to_string(),
            Ok(()) => "completed".to_string(),
            Err(error) => format!("aborted: {error}"),
        };
        let stages = Stage::ALL
            .iter()
            .map(|&stage| StageReport {
                stage: stage.to_string(),
                status: self.stage_status(stage),
                batches: self
                    .batches
                    .iter()
                    .filter(|(s, _)| *s == stage)
                    .map(|(_, report)| report.clone())
                    .collect(),
            })
            .collect();
        ExecutionReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcome: outcome_text,
            stages,
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
