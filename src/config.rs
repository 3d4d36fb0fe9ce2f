//! Pipeline configuration.
//!
//! [`PipelineOptions`] is the single aggregate every run is driven by. It
//! can be assembled programmatically, loaded from a YAML document, or built
//! by the CLI layer merging flags over a loaded document. Validation runs
//! once at startup; afterwards the options are treated as immutable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::preprocess::ColorChannel;
use crate::command::registration::SimilarityMetric;
use crate::error::PipelineError;
use crate::range::SliceRange;

/// Default basename for assembled volumes.
pub const DEFAULT_VOLUME_NAME: &str = "output_volume";

/// Everything one alignment run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineOptions {
    /// Slice interval and reference slice.
    pub range: SliceRange,
    /// Directory holding the raw input slices.
    pub input_dir: PathBuf,
    /// Directory the pipeline lays its artifacts out under.
    pub work_dir: PathBuf,
    /// Override for the assembled volume directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Override for the transform directory.
    #[serde(default)]
    pub transforms_dir: Option<PathBuf>,
    /// Basename of the assembled volumes.
    #[serde(default = "default_volume_name")]
    pub volume_name: String,
    #[serde(default)]
    pub skip: SkipFlags,
    #[serde(default)]
    pub registration: RegistrationOptions,
    #[serde(default)]
    pub volume: VolumeOptions,
    #[serde(default)]
    pub execution: ExecutionOptions,
}

fn default_volume_name() -> String {
    DEFAULT_VOLUME_NAME.to_string()
}

impl PipelineOptions {
    /// Stock options for a range, with every tunable at its default.
    pub fn new(
        range: SliceRange,
        input_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            range,
            input_dir: input_dir.into(),
            work_dir: work_dir.into(),
            output_dir: None,
            transforms_dir: None,
            volume_name: default_volume_name(),
            skip: SkipFlags::default(),
            registration: RegistrationOptions::default(),
            volume: VolumeOptions::default(),
            execution: ExecutionOptions::default(),
        }
    }

    /// Load a YAML options document.
    pub fn from_yaml_file(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&text).map_err(|e| {
            PipelineError::config(format!("invalid options document {}: {e}", path.display()))
        })
    }

    /// Check cross-field invariants. Called once at startup; every failure
    /// is a configuration error naming the offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.range.validate()?;
        if self.volume_name.is_empty() {
            return Err(PipelineError::config("volume name must not be empty"));
        }
        self.registration.validate()?;
        self.volume.validate()?;
        self.execution.validate()?;
        Ok(())
    }
}

/// Per-stage skip flags. A skipped stage is assumed to have produced its
/// outputs in a previous run; the stage barrier treats it as satisfied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkipFlags {
    pub slice_generation: bool,
    pub transforms: bool,
    pub reslice: bool,
    pub volumes: bool,
}

/// Tunables of the pairwise registration and slice preparation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationOptions {
    pub metric: SimilarityMetric,
    pub metric_parameter: u32,
    pub metric_weight: f64,
    /// Restrict the affine search to rigid transforms.
    pub use_rigid_affine: bool,
    pub affine_iterations: Vec<i64>,
    /// Deformable schedule `[0]` disables the deformable stage, leaving
    /// pure affine alignment.
    pub deformable_iterations: Vec<i64>,
    pub histogram_matching: bool,
    /// Sample count for the mutual information estimate.
    pub mi_samples: u32,
    /// Crop applied to the grayscale slices before registration,
    /// `[ox, oy, sx, sy]` in voxels.
    pub registration_roi: Option<[i64; 4]>,
    /// Downscale factor applied to the grayscale slices before
    /// registration.
    pub registration_resize: Option<f64>,
    pub registration_color_channel: ColorChannel,
    pub median_filter_radius: Option<[i64; 2]>,
    pub invert_grayscale: bool,
    pub invert_multichannel: bool,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::MI,
            metric_parameter: 32,
            metric_weight: 1.0,
            use_rigid_affine: false,
            affine_iterations: vec![10000; 5],
            deformable_iterations: vec![0],
            histogram_matching: true,
            mi_samples: 16000,
            registration_roi: None,
            registration_resize: None,
            registration_color_channel: ColorChannel::Blue,
            median_filter_radius: None,
            invert_grayscale: false,
            invert_multichannel: false,
        }
    }
}

impl RegistrationOptions {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.affine_iterations.is_empty() || self.deformable_iterations.is_empty() {
            return Err(PipelineError::config(
                "iteration schedules must contain at least one level",
            ));
        }
        if self.affine_iterations.iter().any(|&n| n < 0)
            || self.deformable_iterations.iter().any(|&n| n < 0)
        {
            return Err(PipelineError::config("iteration counts cannot be negative"));
        }
        if self.metric_weight <= 0.0 {
            return Err(PipelineError::config("metric weight must be positive"));
        }
        if let Some(resize) = self.registration_resize {
            if resize <= 0.0 {
                return Err(PipelineError::config("resize factor must be positive"));
            }
        }
        if let Some(roi) = self.registration_roi {
            validate_roi("registration_roi", &roi)?;
        }
        if let Some(radius) = self.median_filter_radius {
            if radius.iter().any(|&r| r < 1) {
                return Err(PipelineError::config(
                    "median filter radius must be at least 1 voxel",
                ));
            }
        }
        Ok(())
    }
}

/// Geometry stamped onto the assembled output volumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeOptions {
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    /// Anatomical orientation code, e.g. `RAS`.
    pub orientation_code: String,
    pub permutation_order: [i64; 3],
    pub scalar_type: String,
    pub interpolation: String,
    pub resample: Option<[f64; 3]>,
    /// Crop applied while reslicing, `[ox, oy, sx, sy]` in voxels of the
    /// reference frame.
    pub output_roi: Option<[i64; 4]>,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            spacing: [1.0, 1.0, 1.0],
            origin: [0.0, 0.0, 0.0],
            orientation_code: "RAS".to_string(),
            permutation_order: [0, 1, 2],
            scalar_type: "uchar".to_string(),
            interpolation: "linear".to_string(),
            resample: None,
            output_roi: None,
        }
    }
}

impl VolumeOptions {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.spacing.iter().any(|&s| s <= 0.0) {
            return Err(PipelineError::config("volume spacing must be positive"));
        }
        let mut axes = self.permutation_order;
        axes.sort_unstable();
        if axes != [0, 1, 2] {
            return Err(PipelineError::config(
                "permutation order must rearrange the axes 0 1 2",
            ));
        }
        if let Some(resample) = self.resample {
            if resample.iter().any(|&f| f <= 0.0) {
                return Err(PipelineError::config("resample factors must be positive"));
            }
        }
        if let Some(roi) = self.output_roi {
            validate_roi("output_roi", &roi)?;
        }
        Ok(())
    }
}

/// How external commands are executed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionOptions {
    /// Upper bound on concurrently running commands. Unset sizes the pool
    /// to the available CPUs.
    pub jobs: Option<usize>,
    /// Per-command wall clock limit, e.g. `30m`.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
    /// Print every command instead of running it.
    pub dry_run: bool,
    /// Verify raw input slices exist before starting.
    pub check_inputs: bool,
    /// Write a JSON execution report here after the run.
    pub report: Option<PathBuf>,
}

impl ExecutionOptions {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.jobs == Some(0) {
            return Err(PipelineError::config("jobs must be at least 1"));
        }
        if self.command_timeout == Some(Duration::ZERO) {
            return Err(PipelineError::config("command timeout must be non-zero"));
        }
        Ok(())
    }
}

fn validate_roi(field: &str, roi: &[i64; 4]) -> Result<(), PipelineError> {
    let [ox, oy, sx, sy] = *roi;
    if ox < 0 || oy < 0 {
        return Err(PipelineError::config(format!(
            "{field}: origin cannot be negative"
        )));
    }
    if sx < 1 || sy < 1 {
        return Err(PipelineError::config(format!(
            "{field}: size must be at least 1 voxel"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PipelineOptions {
        let range = SliceRange::new(50, 70, 60).unwrap();
        PipelineOptions::new(range, "/data/raw", "/work")
    }

    #[test]
    fn stock_options_validate() {
        options().validate().unwrap();
    }

    #[test]
    fn stock_registration_defaults_disable_the_deformable_stage() {
        let defaults = RegistrationOptions::default();
        assert_eq!(defaults.metric, SimilarityMetric::MI);
        assert_eq!(defaults.metric_parameter, 32);
        assert_eq!(defaults.affine_iterations, vec![10000; 5]);
        assert_eq!(defaults.deformable_iterations, vec![0]);
        assert!(defaults.histogram_matching);
        assert_eq!(defaults.registration_color_channel, ColorChannel::Blue);
    }

    #[test]
    fn minimal_yaml_document_fills_in_defaults() {
        let doc = "
range: { start: 50, end: 70, reference: 60 }
input_dir: /data/raw
work_dir: /work
";
        let options: PipelineOptions = serde_yaml::from_str(doc).unwrap();
        options.validate().unwrap();
        assert_eq!(options.volume_name, DEFAULT_VOLUME_NAME);
        assert_eq!(options.registration.mi_samples, 16000);
        assert!(!options.skip.transforms);
    }

    #[test]
    fn yaml_timeout_accepts_humantime_strings() {
        let doc = "
range: { start: 0, end: 1, reference: 0 }
input_dir: /in
work_dir: /work
execution: { command_timeout: 30m }
";
        let options: PipelineOptions = serde_yaml::from_str(doc).unwrap();
        assert_eq!(
            options.execution.command_timeout,
            Some(Duration::from_secs(1800))
        );
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let doc = "
range: { start: 0, end: 1, reference: 0 }
input_dir: /in
work_dir: /work
rnage: oops
";
        assert!(serde_yaml::from_str::<PipelineOptions>(doc).is_err());
    }

    #[test]
    fn zero_jobs_fail_validation() {
        let mut options = options();
        options.execution.jobs = Some(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn degenerate_permutation_fails_validation() {
        let mut options = options();
        options.volume.permutation_order = [0, 1, 1];
        assert!(options.validate().is_err());
    }

    #[test]
    fn negative_roi_origin_fails_validation() {
        let mut options = options();
        options.volume.output_roi = Some([-1, 0, 100, 100]);
        assert!(options.validate().is_err());
    }

    #[test]
    fn empty_iteration_schedule_fails_validation() {
        let mut options = options();
        options.registration.affine_iterations.clear();
        assert!(options.validate().is_err());
    }
}
