//! Command-line surface.
//!
//! Flags mirror the fields of [`PipelineOptions`]. A run can be driven
//! entirely by flags, entirely by a YAML options document (`--config`), or
//! by a document with explicit flags layered on top.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::command::preprocess::ColorChannel;
use crate::command::registration::SimilarityMetric;
use crate::config::PipelineOptions;
use crate::error::PipelineError;
use crate::range::SliceRange;

#[derive(Parser, Debug)]
#[command(name = "stackalign")]
#[command(
    about = "Align serial sections into a volume by chained pairwise registration",
    version
)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// YAML options document; explicit flags override its fields
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Slice interval and reference slice
    #[arg(long, num_args = 3, value_names = ["START", "END", "REF"])]
    pub slice_range: Option<Vec<u32>>,

    /// Directory holding the raw input slices
    #[arg(short = 'i', long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Directory the pipeline works under
    #[arg(short = 'd', long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Directory for the assembled volumes (default: inside the work directory)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for transforms (default: inside the work directory)
    #[arg(long, value_name = "DIR")]
    pub transforms_dir: Option<PathBuf>,

    /// Basename of the assembled volumes
    #[arg(long, value_name = "NAME")]
    pub volume_name: Option<String>,

    /// Reuse prepared slices from a previous run
    #[arg(long)]
    pub skip_slice_generation: bool,

    /// Reuse transforms from a previous run
    #[arg(long)]
    pub skip_transforms: bool,

    /// Reuse resliced sections from a previous run
    #[arg(long)]
    pub skip_reslice: bool,

    /// Do not assemble output volumes
    #[arg(long)]
    pub skip_volumes: bool,

    /// Similarity metric: CC, MI or MSQ
    #[arg(long, value_name = "METRIC")]
    pub metric: Option<SimilarityMetric>,

    /// Metric parameter (CC window radius, MI histogram bins)
    #[arg(long, value_name = "N")]
    pub metric_parameter: Option<u32>,

    /// Metric weight
    #[arg(long, value_name = "W")]
    pub metric_weight: Option<f64>,

    /// Restrict the affine search to rigid transforms
    #[arg(long)]
    pub rigid_affine: bool,

    /// Affine iteration schedule, one value per level
    #[arg(long, num_args = 1.., value_name = "N")]
    pub affine_iterations: Option<Vec<i64>>,

    /// Deformable iteration schedule, one value per level ([0] disables)
    #[arg(long, num_args = 1.., value_name = "N")]
    pub deformable_iterations: Option<Vec<i64>>,

    /// Disable histogram matching before registration
    #[arg(long)]
    pub no_histogram_matching: bool,

    /// Sample count for the mutual information estimate
    #[arg(long, value_name = "N")]
    pub mi_samples: Option<u32>,

    /// Crop registration grayscales to a region (voxels)
    #[arg(long, num_args = 4, value_names = ["OX", "OY", "SX", "SY"])]
    pub registration_roi: Option<Vec<i64>>,

    /// Downscale registration grayscales by this factor
    #[arg(long, value_name = "FACTOR")]
    pub registration_resize: Option<f64>,

    /// RGB channel registered on: red, green or blue
    #[arg(long, value_name = "CHANNEL")]
    pub registration_color: Option<ColorChannel>,

    /// Median filter radius applied to registration grayscales (voxels)
    #[arg(long, num_args = 2, value_names = ["RX", "RY"])]
    pub median_filter: Option<Vec<i64>>,

    /// Invert grayscale slices during preparation
    #[arg(long)]
    pub invert_grayscale: bool,

    /// Invert color channels while reslicing
    #[arg(long)]
    pub invert_multichannel: bool,

    /// Voxel spacing of the output volumes
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    pub output_spacing: Option<Vec<f64>>,

    /// Origin of the output volumes
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    pub output_origin: Option<Vec<f64>>,

    /// Anatomical orientation code of the output volumes
    #[arg(long, value_name = "CODE")]
    pub output_orientation: Option<String>,

    /// Axis permutation of the output volumes
    #[arg(long, num_args = 3, value_names = ["A", "B", "C"])]
    pub output_permutation: Option<Vec<i64>>,

    /// Scalar type of the output volumes
    #[arg(long, value_name = "TYPE")]
    pub output_scalar_type: Option<String>,

    /// Interpolation used while stacking
    #[arg(long, value_name = "MODE")]
    pub output_interpolation: Option<String>,

    /// Resampling factors applied while stacking (percent per axis)
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    pub output_resample: Option<Vec<f64>>,

    /// Crop applied while reslicing (voxels of the reference frame)
    #[arg(long, num_args = 4, value_names = ["OX", "OY", "SX", "SY"])]
    pub output_roi: Option<Vec<i64>>,

    /// Maximum number of commands run at once (default: CPU count)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-command timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print every command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Verify raw input slices exist before starting
    #[arg(long)]
    pub check_inputs: bool,

    /// Write a JSON execution report
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

impl Cli {
    /// Assemble validated pipeline options: the config document first, then
    /// explicit flags on top.
    pub fn into_options(self) -> Result<PipelineOptions, PipelineError> {
        let mut options = match &self.config {
            Some(path) => PipelineOptions::from_yaml_file(path)?,
            None => {
                let range = self.parse_range()?.ok_or_else(|| {
                    PipelineError::config("--slice-range is required without --config")
                })?;
                let input_dir = self.input_dir.clone().ok_or_else(|| {
                    PipelineError::config("--input-dir is required without --config")
                })?;
                let work_dir = self.work_dir.clone().ok_or_else(|| {
                    PipelineError::config("--work-dir is required without --config")
                })?;
                PipelineOptions::new(range, input_dir, work_dir)
            }
        };
        self.apply_overrides(&mut options)?;
        options.validate()?;
        Ok(options)
    }

    fn parse_range(&self) -> Result<Option<SliceRange>, PipelineError> {
        match self.slice_range.as_deref() {
            None => Ok(None),
            Some(&[start, end, reference]) => SliceRange::new(start, end, reference).map(Some),
            Some(_) => Err(PipelineError::config(
                "--slice-range takes exactly three values: START END REF",
            )),
        }
    }

    fn apply_overrides(&self, options: &mut PipelineOptions) -> Result<(), PipelineError> {
        if let Some(range) = self.parse_range()? {
            options.range = range;
        }
        if let Some(dir) = &self.input_dir {
            options.input_dir = dir.clone();
        }
        if let Some(dir) = &self.work_dir {
            options.work_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            options.output_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.transforms_dir {
            options.transforms_dir = Some(dir.clone());
        }
        if let Some(name) = &self.volume_name {
            options.volume_name = name.clone();
        }

        options.skip.slice_generation |= self.skip_slice_generation;
        options.skip.transforms |= self.skip_transforms;
        options.skip.reslice |= self.skip_reslice;
        options.skip.volumes |= self.skip_volumes;

        let reg = &mut options.registration;
        if let Some(metric) = self.metric {
            reg.metric = metric;
        }
        if let Some(parameter) = self.metric_parameter {
            reg.metric_parameter = parameter;
        }
        if let Some(weight) = self.metric_weight {
            reg.metric_weight = weight;
        }
        reg.use_rigid_affine |= self.rigid_affine;
        if let Some(iterations) = &self.affine_iterations {
            reg.affine_iterations = iterations.clone();
        }
        if let Some(iterations) = &self.deformable_iterations {
            reg.deformable_iterations = iterations.clone();
        }
        if self.no_histogram_matching {
            reg.histogram_matching = false;
        }
        if let Some(samples) = self.mi_samples {
            reg.mi_samples = samples;
        }
        if let Some(roi) = &self.registration_roi {
            reg.registration_roi = Some(fixed_arity(roi, "--registration-roi")?);
        }
        if let Some(factor) = self.registration_resize {
            reg.registration_resize = Some(factor);
        }
        if let Some(channel) = self.registration_color {
            reg.registration_color_channel = channel;
        }
        if let Some(radius) = &self.median_filter {
            reg.median_filter_radius = Some(fixed_arity(radius, "--median-filter")?);
        }
        reg.invert_grayscale |= self.invert_grayscale;
        reg.invert_multichannel |= self.invert_multichannel;

        let vol = &mut options.volume;
        if let Some(spacing) = &self.output_spacing {
            vol.spacing = fixed_arity(spacing, "--output-spacing")?;
        }
        if let Some(origin) = &self.output_origin {
            vol.origin = fixed_arity(origin, "--output-origin")?;
        }
        if let Some(code) = &self.output_orientation {
            vol.orientation_code = code.clone();
        }
        if let Some(permutation) = &self.output_permutation {
            vol.permutation_order = fixed_arity(permutation, "--output-permutation")?;
        }
        if let Some(scalar_type) = &self.output_scalar_type {
            vol.scalar_type = scalar_type.clone();
        }
        if let Some(interpolation) = &self.output_interpolation {
            vol.interpolation = interpolation.clone();
        }
        if let Some(resample) = &self.output_resample {
            vol.resample = Some(fixed_arity(resample, "--output-resample")?);
        }
        if let Some(roi) = &self.output_roi {
            vol.output_roi = Some(fixed_arity(roi, "--output-roi")?);
        }

        let exec = &mut options.execution;
        if let Some(jobs) = self.jobs {
            exec.jobs = Some(jobs);
        }
        if let Some(secs) = self.timeout {
            exec.command_timeout = Some(Duration::from_secs(secs));
        }
        exec.dry_run |= self.dry_run;
        exec.check_inputs |= self.check_inputs;
        if let Some(path) = &self.report {
            exec.report = Some(path.clone());
        }
        Ok(())
    }
}

fn fixed_arity<T: Copy, const N: usize>(values: &[T], flag: &str) -> Result<[T; N], PipelineError> {
    values
        .try_into()
        .map_err(|_| PipelineError::config(format!("{flag} takes exactly {N} values")))
}
