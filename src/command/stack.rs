//! Volume assembly via `stack_sections`.
//!
//! Collects the resliced sections matched by a printf-style filename mask
//! into a single volume and stamps the declared geometry (spacing, origin,
//! anatomical orientation, axis permutation) onto the result.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use super::{Bindings, CommandError, ExternalCommand, ParamKind, ParamSpec, ParamValue};
use crate::range::SliceRange;

const COMMAND: &str = "stack";

/// Section stacking executable.
pub const PROGRAM: &str = "stack_sections";

static PARAMS: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::new("input_mask", ParamKind::Filename),
        ParamSpec::new("output_volume", ParamKind::Filename),
        ParamSpec::new("slice_start", ParamKind::Scalar),
        ParamSpec::new("slice_end", ParamKind::Scalar),
        ParamSpec::with_default("slice_step", ParamValue::scalar(1)),
        ParamSpec::with_default("permutation", ParamValue::IntVector(vec![0, 1, 2])),
        ParamSpec::with_default("orientation", ParamValue::scalar("RAS")),
        ParamSpec::with_default("scalar_type", ParamValue::scalar("uchar")),
        ParamSpec::with_default("interpolation", ParamValue::scalar("linear")),
        ParamSpec::with_default("spacing", ParamValue::FloatVector(vec![1.0, 1.0, 1.0])),
        ParamSpec::with_default("origin", ParamValue::FloatVector(vec![0.0, 0.0, 0.0])),
        ParamSpec::new("resample", ParamKind::FloatVector),
    ]
});

/// Declared parameter table of the stacking template.
pub fn params() -> &'static [ParamSpec] {
    PARAMS.as_slice()
}

/// Builder for one volume stacking invocation.
#[derive(Debug, Clone)]
pub struct StackCommand {
    label: String,
    bindings: Bindings,
}

impl StackCommand {
    /// `input_mask` is a printf-style pattern (`%04d`) the stacker expands
    /// for every index in `range`.
    pub fn new(
        label: impl Into<String>,
        input_mask: impl Into<PathBuf>,
        output_volume: impl Into<PathBuf>,
        range: &SliceRange,
    ) -> Result<Self, CommandError> {
        let mut bindings = Bindings::new(COMMAND, params());
        bindings.set("input_mask", ParamValue::filename(input_mask))?;
        bindings.set("output_volume", ParamValue::filename(output_volume))?;
        bindings.set("slice_start", ParamValue::scalar(range.start))?;
        bindings.set("slice_end", ParamValue::scalar(range.end))?;
        Ok(Self {
            label: label.into(),
            bindings,
        })
    }

    /// Override a declared parameter.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<&mut Self, CommandError> {
        self.bindings.set(name, value)?;
        Ok(self)
    }

    pub fn build(&self) -> Result<ExternalCommand, CommandError> {
        let b = &self.bindings;
        let mut args: Vec<String> = vec![
            "-i".into(),
            b.require_render("input_mask")?,
            "-o".into(),
            b.require_render("output_volume")?,
            "--stacking-range".into(),
            b.require_render("slice_start")?,
            b.require_render("slice_end")?,
            b.require_render("slice_step")?,
            "--permutation".into(),
        ];
        push_elements(&mut args, b.int_vector("permutation").iter().map(i64::to_string));
        args.push("--orientation".into());
        args.push(b.require_render("orientation")?);
        args.push("--type".into());
        args.push(b.require_render("scalar_type")?);
        args.push("--interpolation".into());
        args.push(b.require_render("interpolation")?);
        args.push("--spacing".into());
        push_elements(&mut args, b.float_vector("spacing").iter().map(f64::to_string));
        args.push("--origin".into());
        push_elements(&mut args, b.float_vector("origin").iter().map(f64::to_string));
        let resample = b.float_vector("resample");
        if !resample.is_empty() {
            args.push("--resample".into());
            push_elements(&mut args, resample.iter().map(f64::to_string));
        }
        Ok(ExternalCommand::new(&self.label, PROGRAM, args))
    }
}

fn push_elements(args: &mut Vec<String>, elements: impl Iterator<Item = String>) {
    args.extend(elements);
}
