//! Composite transform assembly via `ComposeMultiTransform`.
//!
//! Takes the partial transforms of one chain, already in application order
//! (moving-side transform first), and writes the single composed transform
//! that maps a slice into the reference frame.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use super::{Bindings, CommandError, ExternalCommand, ParamKind, ParamSpec, ParamValue};

const COMMAND: &str = "compose";

/// Transform composition executable.
pub const PROGRAM: &str = "ComposeMultiTransform";

static PARAMS: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::with_default("dimension", ParamValue::scalar(2)),
        ParamSpec::new("output_transform", ParamKind::Filename),
        ParamSpec::new("transforms", ParamKind::FilenameList),
    ]
});

/// Declared parameter table of the composition template.
pub fn params() -> &'static [ParamSpec] {
    PARAMS.as_slice()
}

/// Builder for one transform composition invocation.
#[derive(Debug, Clone)]
pub struct ComposeCommand {
    label: String,
    bindings: Bindings,
}

impl ComposeCommand {
    /// `transforms` must already be in application order; it is emitted
    /// verbatim.
    pub fn new(
        label: impl Into<String>,
        output: impl Into<PathBuf>,
        transforms: Vec<PathBuf>,
    ) -> Result<Self, CommandError> {
        let mut bindings = Bindings::new(COMMAND, params());
        bindings.set("output_transform", ParamValue::filename(output))?;
        bindings.set("transforms", ParamValue::FilenameList(transforms))?;
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

    /// Emit the invocation: dimension, output, then the ordered inputs.
    pub fn build(&self) -> Result<ExternalCommand, CommandError> {
        let b = &self.bindings;
        let mut args = vec![b.require_render("dimension")?, b.require_render("output_transform")?];
        b.require("transforms")?;
        for path in b.filenames("transforms") {
            args.push(path.display().to_string());
        }
        Ok(ExternalCommand::new(&self.label, PROGRAM, args))
    }
}
