//! Source slice preparation via `slice_preprocess`.
//!
//! Turns one raw section into the two inputs the rest of the pipeline
//! consumes: a grayscale slice for registration (single channel extracted
//! from the color image, optionally cropped, resized, median-filtered or
//! inverted) and a color slice for the final resliced volume.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{Bindings, CommandError, ExternalCommand, ParamKind, ParamSpec, ParamValue};

const COMMAND: &str = "preprocess";

/// Slice preparation executable.
pub const PROGRAM: &str = "slice_preprocess";

/// RGB channel used as the registration grayscale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

impl fmt::Display for ColorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorChannel::Red => "red",
            ColorChannel::Green => "green",
            ColorChannel::Blue => "blue",
        };
        f.write_str(name)
    }
}

impl FromStr for ColorChannel {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(ColorChannel::Red),
            "green" | "g" => Ok(ColorChannel::Green),
            "blue" | "b" => Ok(ColorChannel::Blue),
            _ => Err(format!(
                "unknown color channel `{text}`, expected red, green or blue"
            )),
        }
    }
}

static PARAMS: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    vec![
        ParamSpec::new("input_image", ParamKind::Filename),
        ParamSpec::new("grayscale_output", ParamKind::Filename),
        ParamSpec::new("color_output", ParamKind::Filename),
        ParamSpec::with_default("color_channel", ParamValue::scalar(ColorChannel::Blue)),
        ParamSpec::new("registration_roi", ParamKind::IntVector),
        ParamSpec::new("resize_factor", ParamKind::Scalar),
        ParamSpec::new("median_filter", ParamKind::IntVector),
        ParamSpec::with_default("invert_grayscale", ParamValue::Switch(false)),
        ParamSpec::with_default("invert_multichannel", ParamValue::Switch(false)),
    ]
});

/// Declared parameter table of the preparation template.
pub fn params() -> &'static [ParamSpec] {
    PARAMS.as_slice()
}

/// Builder for one slice preparation invocation.
#[derive(Debug, Clone)]
pub struct PreprocessCommand {
    label: String,
    bindings: Bindings,
}

impl PreprocessCommand {
    pub fn new(
        label: impl Into<String>,
        input: impl Into<PathBuf>,
        grayscale_output: impl Into<PathBuf>,
        color_output: impl Into<PathBuf>,
    ) -> Result<Self, CommandError> {
        let mut bindings = Bindings::new(COMMAND, params());
        bindings.set("input_image", ParamValue::filename(input))?;
        bindings.set("grayscale_output", ParamValue::filename(grayscale_output))?;
        bindings.set("color_output", ParamValue::filename(color_output))?;
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
            b.require_render("input_image")?,
            "-g".into(),
            b.require_render("grayscale_output")?,
            "-c".into(),
            b.require_render("color_output")?,
            "--color-channel".into(),
            b.require_render("color_channel")?,
        ];
        let roi = b.int_vector("registration_roi");
        if !roi.is_empty() {
            args.push("--registration-roi".into());
            args.extend(roi.iter().map(i64::to_string));
        }
        if let Some(factor) = b.render("resize_factor") {
            args.push("--resize-factor".into());
            args.push(factor);
        }
        let radius = b.int_vector("median_filter");
        if !radius.is_empty() {
            args.push("--median-filter".into());
            args.extend(radius.iter().map(i64::to_string));
        }
        if b.switch_on("invert_grayscale") {
            args.push("--invert-grayscale".into());
        }
        if b.switch_on("invert_multichannel") {
            args.push("--invert-multichannel".into());
        }
        Ok(ExternalCommand::new(&self.label, PROGRAM, args))
    }
}
