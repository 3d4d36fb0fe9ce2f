//! Common test utilities and helpers

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use stackalign::config::PipelineOptions;
use stackalign::executor::ScriptedRunner;
use stackalign::pipeline::AlignmentPipeline;
use stackalign::range::SliceRange;

type OptionsTweak = Box<dyn FnOnce(&mut PipelineOptions)>;

/// Builder for pipeline fixtures backed by a scripted runner.
pub struct PipelineTestBuilder {
    start: u32,
    end: u32,
    reference: u32,
    jobs: usize,
    delay: Option<Duration>,
    tweaks: Vec<OptionsTweak>,
}

impl PipelineTestBuilder {
    /// Five slices around reference 52, two jobs.
    pub fn new() -> Self {
        Self {
            start: 50,
            end: 54,
            reference: 52,
            jobs: 2,
            delay: None,
            tweaks: Vec::new(),
        }
    }

    /// Override the slice range.
    pub fn with_range(mut self, start: u32, end: u32, reference: u32) -> Self {
        self.start = start;
        self.end = end;
        self.reference = reference;
        self
    }

    /// Override the concurrency limit.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Add artificial latency per scripted command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Adjust the options before the pipeline is assembled.
    pub fn configured(mut self, tweak: impl FnOnce(&mut PipelineOptions) + 'static) -> Self {
        self.tweaks.push(Box::new(tweak));
        self
    }

    /// Build the fixture.
    pub fn build(self) -> Result<PipelineTestContext> {
        let work_dir = TempDir::new()?;
        let range = SliceRange::new(self.start, self.end, self.reference)?;
        let mut options = PipelineOptions::new(
            range,
            work_dir.path().join("raw"),
            work_dir.path().join("work"),
        );
        options.execution.jobs = Some(self.jobs);
        for tweak in self.tweaks {
            tweak(&mut options);
        }
        let mut runner = ScriptedRunner::new();
        if let Some(delay) = self.delay {
            runner = runner.with_delay(delay);
        }
        let runner = Arc::new(runner);
        let pipeline = AlignmentPipeline::new(options, runner.clone())?;
        Ok(PipelineTestContext {
            work_dir,
            runner,
            pipeline,
        })
    }
}

impl Default for PipelineTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembled pipeline plus the scripted runner recording its commands.
pub struct PipelineTestContext {
    work_dir: TempDir,
    pub runner: Arc<ScriptedRunner>,
    pub pipeline: AlignmentPipeline,
}

impl PipelineTestContext {
    /// Root of the fixture's temporary directory tree.
    pub fn root(&self) -> &Path {
        self.work_dir.path()
    }
}
