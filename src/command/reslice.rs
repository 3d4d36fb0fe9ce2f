//! Slice reslicing via the `c2d` image calculator.
//!
//! Applies a composed transform to a source slice, resampling it into the
//! reference frame. Grayscale slices go through a single reslice; RGB
//! slices are split into channels, each channel is resliced with the same
//! transform, and the results are recomposed into a multichannel image.
//! An optional output region crops the resampled slice, and the color
//! variant can invert intensities for bright-field stains.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use super::{Bindings, CommandError, ExternalCommand, ParamKind, ParamSpec, ParamValue};

/// Image calculator executable for two-dimensional slices.
pub const PROGRAM: &str = "c2d";

/// Post-reslice intensity inversion, applied per channel.
const INVERT_TOKENS: [&str; 6] = ["-scale", "-1", "-shift", "255", "-type", "uchar"];

fn common_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::new("reference_image", ParamKind::Filename),
        ParamSpec::new("moving_image", ParamKind::Filename),
        ParamSpec::new("transformation", ParamKind::Filename),
        ParamSpec::new("output_image", ParamKind::Filename),
        ParamSpec::new("region_origin", ParamKind::IntVector),
        ParamSpec::new("region_size", ParamKind::IntVector),
    ]
}

static GRAY_PARAMS: Lazy<Vec<ParamSpec>> = Lazy::new(common_params);

static COLOR_PARAMS: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
    let mut params = common_params();
    params.push(ParamSpec::with_default("invert", ParamValue::Switch(false)));
    params
});

/// Declared parameter table of the grayscale template.
pub fn gray_params() -> &'static [ParamSpec] {
    GRAY_PARAMS.as_slice()
}

/// Declared parameter table of the multichannel template.
pub fn color_params() -> &'static [ParamSpec] {
    COLOR_PARAMS.as_slice()
}

/// Builder for one grayscale reslice invocation.
#[derive(Debug, Clone)]
pub struct ResliceGrayCommand {
    label: String,
    bindings: Bindings,
}

impl ResliceGrayCommand {
    pub fn new(
        label: impl Into<String>,
        reference: impl Into<PathBuf>,
        moving: impl Into<PathBuf>,
        transform: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Result<Self, CommandError> {
        let mut bindings = Bindings::new("reslice-gray", gray_params());
        bindings.set("reference_image", ParamValue::filename(reference))?;
        bindings.set("moving_image", ParamValue::filename(moving))?;
        bindings.set("transformation", ParamValue::filename(transform))?;
        bindings.set("output_image", ParamValue::filename(output))?;
        Ok(Self {
            label: label.into(),
            bindings,
        })
    }

    /// Crop the resampled slice to a voxel region.
    pub fn with_region(&mut self, origin: [i64; 2], size: [i64; 2]) -> Result<&mut Self, CommandError> {
        self.bindings
            .set("region_origin", ParamValue::IntVector(origin.to_vec()))?;
        self.bindings
            .set("region_size", ParamValue::IntVector(size.to_vec()))?;
        Ok(self)
    }

    /// Override a declared parameter.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<&mut Self, CommandError> {
        self.bindings.set(name, value)?;
        Ok(self)
    }

    pub fn build(&self) -> Result<ExternalCommand, CommandError> {
        let b = &self.bindings;
        let mut args: Vec<String> = vec![
            "-verbose".into(),
            b.require_render("reference_image")?,
            "-as".into(),
            "ref".into(),
            "-clear".into(),
            b.require_render("moving_image")?,
            "-as".into(),
            "moving".into(),
            "-push".into(),
            "ref".into(),
            "-push".into(),
            "moving".into(),
            "-reslice-itk".into(),
            b.require_render("transformation")?,
        ];
        push_region(b, &mut args);
        args.push("-type".into());
        args.push("uchar".into());
        args.push("-o".into());
        args.push(b.require_render("output_image")?);
        Ok(ExternalCommand::new(&self.label, PROGRAM, args))
    }
}

/// Builder for one multichannel reslice invocation.
#[derive(Debug, Clone)]
pub struct ResliceColorCommand {
    label: String,
    bindings: Bindings,
}

impl ResliceColorCommand {
    pub fn new(
        label: impl Into<String>,
        reference: impl Into<PathBuf>,
        moving: impl Into<PathBuf>,
        transform: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Result<Self, CommandError> {
        let mut bindings = Bindings::new("reslice-color", color_params());
        bindings.set("reference_image", ParamValue::filename(reference))?;
        bindings.set("moving_image", ParamValue::filename(moving))?;
        bindings.set("transformation", ParamValue::filename(transform))?;
        bindings.set("output_image", ParamValue::filename(output))?;
        Ok(Self {
            label: label.into(),
            bindings,
        })
    }

    /// Crop the resampled slice to a voxel region.
    pub fn with_region(&mut self, origin: [i64; 2], size: [i64; 2]) -> Result<&mut Self, CommandError> {
        self.bindings
            .set("region_origin", ParamValue::IntVector(origin.to_vec()))?;
        self.bindings
            .set("region_size", ParamValue::IntVector(size.to_vec()))?;
        Ok(self)
    }

    /// Invert channel intensities after reslicing.
    pub fn with_inversion(&mut self, invert: bool) -> Result<&mut Self, CommandError> {
        self.bindings.set("invert", ParamValue::Switch(invert))?;
        Ok(self)
    }

    /// Override a declared parameter.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<&mut Self, CommandError> {
        self.bindings.set(name, value)?;
        Ok(self)
    }

    pub fn build(&self) -> Result<ExternalCommand, CommandError> {
        let b = &self.bindings;
        let transform = b.require_render("transformation")?;
        let mut args: Vec<String> = vec![
            "-verbose".into(),
            b.require_render("reference_image")?,
            "-as".into(),
            "ref".into(),
            "-clear".into(),
            "-mcs".into(),
            b.require_render("moving_image")?,
            "-as".into(),
            "b".into(),
            "-pop".into(),
            "-as".into(),
            "g".into(),
            "-pop".into(),
            "-as".into(),
            "r".into(),
        ];
        for channel in ["r", "g", "b"] {
            args.push("-push".into());
            args.push("ref".into());
            args.push("-push".into());
            args.push(channel.into());
            args.push("-reslice-itk".into());
            args.push(transform.clone());
            push_region(b, &mut args);
            if b.switch_on("invert") {
                args.extend(INVERT_TOKENS.iter().map(|t| t.to_string()));
            }
            args.push("-as".into());
            args.push(format!("r{channel}"));
            args.push("-clear".into());
        }
        args.extend(
            ["-push", "rr", "-push", "rg", "-push", "rb", "-omc", "3"]
                .iter()
                .map(|t| t.to_string()),
        );
        args.push(b.require_render("output_image")?);
        Ok(ExternalCommand::new(&self.label, PROGRAM, args))
    }
}

fn push_region(bindings: &Bindings, args: &mut Vec<String>) {
    let origin = bindings.int_vector("region_origin");
    let size = bindings.int_vector("region_size");
    if origin.is_empty() || size.is_empty() {
        return;
    }
    args.push("-region".into());
    args.push(format!("{}vox", super::params::join_int_vector(origin)));
    args.push(format!("{}vox", super::params::join_int_vector(size)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray() -> ResliceGrayCommand {
        ResliceGrayCommand::new(
            "reslice gray 0065",
            "ref.nii.gz",
            "0065.nii.gz",
            "ct_m0065_f0060_Affine.txt",
            "out.nii.gz",
        )
        .unwrap()
    }

    fn color() -> ResliceColorCommand {
        ResliceColorCommand::new(
            "reslice color 0065",
            "ref.nii.gz",
            "0065_color.nii.gz",
            "ct_m0065_f0060_Affine.txt",
            "out_color.nii.gz",
        )
        .unwrap()
    }

    #[test]
    fn gray_layout_reslices_the_moving_slice_onto_the_reference() {
        let command = gray().build().unwrap();
        assert_eq!(
            command.shell_line(),
            "c2d -verbose ref.nii.gz -as ref -clear 0065.nii.gz -as moving \
             -push ref -push moving -reslice-itk ct_m0065_f0060_Affine.txt \
             -type uchar -o out.nii.gz"
        );
    }

    #[test]
    fn region_is_rendered_as_voxel_origin_and_size() {
        let mut builder = gray();
        builder.with_region([10, 20], [512, 256]).unwrap();
        let line = builder.build().unwrap().shell_line();
        assert!(line.contains("-region 10x20vox 512x256vox"));
    }

    #[test]
    fn region_is_omitted_without_both_origin_and_size() {
        let line = gray().build().unwrap().shell_line();
        assert!(!line.contains("-region"));
    }

    #[test]
    fn color_layout_reslices_each_channel_with_the_same_transform() {
        let command = color().build().unwrap();
        let reslices = command
            .args()
            .iter()
            .filter(|a| *a == "-reslice-itk")
            .count();
        assert_eq!(reslices, 3);
        assert!(command.args().iter().any(|a| a == "-mcs"));
        let line = command.shell_line();
        assert!(line.contains("-push rr -push rg -push rb -omc 3 out_color.nii.gz"));
    }

    #[test]
    fn inversion_inserts_the_scale_shift_sequence_per_channel() {
        let mut builder = color();
        builder.with_inversion(true).unwrap();
        let line = builder.build().unwrap().shell_line();
        assert_eq!(line.matches("-scale -1 -shift 255").count(), 3);
    }

    #[test]
    fn inversion_defaults_off() {
        let line = color().build().unwrap().shell_line();
        assert!(!line.contains("-scale"));
    }

    #[test]
    fn gray_template_rejects_color_only_parameters() {
        let err = gray().set("invert", ParamValue::Switch(true)).unwrap_err();
        assert!(matches!(err, CommandError::UnknownParameter { .. }));
    }
}
