//! Pairwise slice registration via the `ANTS` engine.
//!
//! One invocation registers a single moving slice onto a single fixed slice
//! and writes the resulting affine transform under the declared output
//! prefix (the engine appends `Affine.txt`). The declared defaults disable
//! the deformable stage, so the stock pipeline computes affine transforms
//! only; overriding `iterations` re-enables it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{Bindings, CommandError, ExternalCommand, ParamKind, ParamSpec, ParamValue};

const COMMAND: &str = "registration";

/// Registration engine executable.
pub const PROGRAM: &str = "ANTS";

/// Similarity metric the registration engine optimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityMetric {
    /// Cross correlation.
    CC,
    /// Mutual information.
    MI,
    /// Mean squared difference.
    MSQ,
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimilarityMetric::CC => "CC",
            SimilarityMetric::MI => "MI",
            SimilarityMetric::MSQ => "MSQ",
        };
        f.write_str(name)
    }
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_uppercase().as_str() {
            "CC" => Ok(SimilarityMetric::CC),
            "MI" => Ok(SimilarityMetric::MI),
            "MSQ" => Ok(SimilarityMetric::MSQ),
            _ => Err(format!(
                "unknown similarity metric `{text}`, expected one of CC, MI, MSQ"
            )),
        }
    }
}

/// One `-m` image-to-image similarity term.
#[derive(Debug, Clone)]
pub struct ImageMetric {
    pub metric: SimilarityMetric,
    pub fixed: PathBuf,
    pub moving: PathBuf,
    pub weight: f64,
    pub parameter: u32,
}

impl ImageMetric {
    pub fn new(
        metric: SimilarityMetric,
        fixed: impl Into<PathBuf>,
        moving: impl Into<PathBuf>,
    ) -> Self {
        Self {
            metric,
            fixed: fixed.into(),
            moving: moving.into(),
            weight: 1.0,
            parameter: 32,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_parameter(mut self, parameter: u32) -> Self {
        self.parameter = parameter;
        self
    }

    /// Bracketed metric argument, e.g. `MI[fixed.nii.gz,moving.nii.gz,1,32]`.
    pub fn argument(&self) -> String {
        format!(
            "{}[{},{},{},{}]",
            self.metric,
            self.fixed.display(),
            self.moving.display(),
            self.weight,
            self.parameter
        )
    }
}

static PARAMS: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::with_default("dimension", ParamValue::scalar(2)),
        ParamSpec::with_default("transformation", ParamValue::scalar("SyN[0.25]")),
        ParamSpec::with_default("regularization", ParamValue::scalar("Gauss[3,1]")),
        ParamSpec::with_default("iterations", ParamValue::IntVector(vec![0])),
        ParamSpec::with_default("affine_iterations", ParamValue::IntVector(vec![10000; 5])),
        ParamSpec::with_default("affine_metric_type", ParamValue::scalar("MI")),
        ParamSpec::new("mi_option", ParamKind::IntVector),
        ParamSpec::with_default("rigid_affine", ParamValue::Switch(false)),
        ParamSpec::with_default("continue_affine", ParamValue::Switch(true)),
        ParamSpec::with_default("histogram_matching", ParamValue::Switch(true)),
        ParamSpec::with_default("use_nn", ParamValue::Switch(false)),
        ParamSpec::with_default("all_metrics_converge", ParamValue::Switch(false)),
        ParamSpec::new("output_naming", ParamKind::Filename),
    ]
});

/// Declared parameter table of the registration template.
pub fn params() -> &'static [ParamSpec] {
    PARAMS.as_slice()
}

/// Builder for one pairwise registration invocation.
#[derive(Debug, Clone)]
pub struct RegistrationCommand {
    label: String,
    metrics: Vec<ImageMetric>,
    bindings: Bindings,
}

impl RegistrationCommand {
    /// Start from the declared defaults with one similarity term and the
    /// transform output prefix. The affine metric type follows the term's
    /// metric unless overridden.
    pub fn new(
        label: impl Into<String>,
        metric: ImageMetric,
        output_prefix: impl Into<PathBuf>,
    ) -> Result<Self, CommandError> {
        let mut bindings = Bindings::new(COMMAND, params());
        bindings.set("output_naming", ParamValue::filename(output_prefix))?;
        bindings.set("affine_metric_type", ParamValue::scalar(metric.metric))?;
        Ok(Self {
            label: label.into(),
            metrics: vec![metric],
            bindings,
        })
    }

    /// Add a further similarity term.
    pub fn add_metric(&mut self, metric: ImageMetric) -> &mut Self {
        self.metrics.push(metric);
        self
    }

    /// Override a declared parameter.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<&mut Self, CommandError> {
        self.bindings.set(name, value)?;
        Ok(self)
    }

    /// Emit the invocation in layout order.
    pub fn build(&self) -> Result<ExternalCommand, CommandError> {
        let b = &self.bindings;
        let mut args = vec![b.require_render("dimension")?];
        for metric in &self.metrics {
            args.push("-m".into());
            args.push(metric.argument());
        }
        args.push("-t".into());
        args.push(b.require_render("transformation")?);
        args.push("-r".into());
        args.push(b.require_render("regularization")?);
        args.push("--output-naming".into());
        args.push(b.require_render("output_naming")?);
        args.push("--number-of-iterations".into());
        args.push(b.require_render("iterations")?);
        args.push("--number-of-affine-iterations".into());
        args.push(b.require_render("affine_iterations")?);
        args.push("--affine-metric-type".into());
        args.push(b.require_render("affine_metric_type")?);
        if let Some(option) = b.render("mi_option") {
            args.push("--MI-option".into());
            args.push(option);
        }
        args.push("--rigid-affine".into());
        args.push(b.require_render("rigid_affine")?);
        args.push("--continue-affine".into());
        args.push(b.require_render("continue_affine")?);
        args.push("--use-Histogram-Matching".into());
        args.push(b.require_render("histogram_matching")?);
        if b.switch_on("use_nn") {
            args.push("--use-NN".into());
        }
        if b.switch_on("all_metrics_converge") {
            args.push("--use-all-metrics-for-convergence".into());
        }
        Ok(ExternalCommand::new(&self.label, PROGRAM, args))
    }
}
