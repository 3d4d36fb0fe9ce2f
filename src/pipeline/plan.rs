//! Stage planning: turning validated options into concrete command batches.
//!
//! Planning is pure: it reads options, the work layout and the pairing and
//! chain strategies, and produces fully bound commands without touching the
//! filesystem. The same plan can therefore be executed, printed for a dry
//! run, or inspected in tests.

use std::path::PathBuf;

use crate::chain::{apply_order, ChainResolver, PairingPolicy};
use crate::command::compose::ComposeCommand;
use crate::command::preprocess::PreprocessCommand;
use crate::command::registration::{ImageMetric, RegistrationCommand};
use crate::command::reslice::{ResliceColorCommand, ResliceGrayCommand};
use crate::command::stack::StackCommand;
use crate::command::{ExternalCommand, ParamValue};
use crate::config::PipelineOptions;
use crate::error::PipelineError;
use crate::layout::WorkLayout;

/// One preparation command per slice: raw section in, registration
/// grayscale and color slice out.
pub fn source_slices(
    options: &PipelineOptions,
    layout: &WorkLayout,
) -> Result<Vec<ExternalCommand>, PipelineError> {
    let reg = &options.registration;
    let mut commands = Vec::with_capacity(options.range.count());
    for index in options.range.iter() {
        let mut builder = PreprocessCommand::new(
            format!("prepare slice {index:04}"),
            layout.raw_slice(index),
            layout.source_gray(index),
            layout.source_color(index),
        )?;
        builder.set(
            "color_channel",
            ParamValue::scalar(reg.registration_color_channel),
        )?;
        if let Some(roi) = reg.registration_roi {
            builder.set("registration_roi", ParamValue::IntVector(roi.to_vec()))?;
        }
        if let Some(factor) = reg.registration_resize {
            builder.set("resize_factor", ParamValue::scalar(factor))?;
        }
        if let Some(radius) = reg.median_filter_radius {
            builder.set("median_filter", ParamValue::IntVector(radius.to_vec()))?;
        }
        builder.set("invert_grayscale", ParamValue::Switch(reg.invert_grayscale))?;
        commands.push(builder.build()?);
    }
    Ok(commands)
}

/// One pairwise registration per link chosen by `policy`. Includes the
/// reference slice's self-registration, whose identity transform anchors
/// every chain.
pub fn partial_transforms(
    options: &PipelineOptions,
    layout: &WorkLayout,
    policy: &dyn PairingPolicy,
) -> Result<Vec<ExternalCommand>, PipelineError> {
    let reg = &options.registration;
    let mut commands = Vec::new();
    for moving in options.range.iter() {
        for link in policy.pairs_for(&options.range, moving) {
            let metric = ImageMetric::new(
                reg.metric,
                layout.source_gray(link.fixed),
                layout.source_gray(link.moving),
            )
            .with_weight(reg.metric_weight)
            .with_parameter(reg.metric_parameter);
            let mut builder = RegistrationCommand::new(
                format!("register slice {:04} -> {:04}", link.moving, link.fixed),
                metric,
                layout.partial_prefix(link.moving, link.fixed),
            )?;
            builder.set(
                "affine_iterations",
                ParamValue::IntVector(reg.affine_iterations.clone()),
            )?;
            builder.set(
                "iterations",
                ParamValue::IntVector(reg.deformable_iterations.clone()),
            )?;
            builder.set("rigid_affine", ParamValue::Switch(reg.use_rigid_affine))?;
            builder.set(
                "histogram_matching",
                ParamValue::Switch(reg.histogram_matching),
            )?;
            builder.set(
                "mi_option",
                ParamValue::IntVector(vec![reg.metric_parameter as i64, reg.mi_samples as i64]),
            )?;
            commands.push(builder.build()?);
        }
    }
    Ok(commands)
}

/// One composition per slice. The partial transforms enter in application
/// order, the moving slice's own transform first.
pub fn composite_transforms(
    options: &PipelineOptions,
    layout: &WorkLayout,
    resolver: &dyn ChainResolver,
) -> Result<Vec<ExternalCommand>, PipelineError> {
    let reference = options.range.reference;
    let mut commands = Vec::with_capacity(options.range.count());
    for moving in options.range.iter() {
        let chain = apply_order(resolver.chain_for(&options.range, moving), moving);
        let transforms: Vec<PathBuf> = chain
            .iter()
            .map(|link| layout.partial_transform(link.from, link.to))
            .collect();
        let command = ComposeCommand::new(
            format!("compose slice {moving:04}"),
            layout.composite_transform(moving, reference),
            transforms,
        )?
        .build()?;
        commands.push(command);
    }
    Ok(commands)
}

/// One grayscale reslice per slice into the reference frame.
pub fn reslice_gray(
    options: &PipelineOptions,
    layout: &WorkLayout,
) -> Result<Vec<ExternalCommand>, PipelineError> {
    let reference_image = layout.source_gray(options.range.reference);
    let mut commands = Vec::with_capacity(options.range.count());
    for index in options.range.iter() {
        let mut builder = ResliceGrayCommand::new(
            format!("reslice gray {index:04}"),
            reference_image.clone(),
            layout.source_gray(index),
            layout.composite_transform(index, options.range.reference),
            layout.resliced_gray(index),
        )?;
        if let Some([ox, oy, sx, sy]) = options.volume.output_roi {
            builder.with_region([ox, oy], [sx, sy])?;
        }
        commands.push(builder.build()?);
    }
    Ok(commands)
}

/// Color counterpart of [`reslice_gray`]. Inversion, when configured, is
/// applied here rather than during slice preparation so the stored color
/// sources stay untouched.
pub fn reslice_color(
    options: &PipelineOptions,
    layout: &WorkLayout,
) -> Result<Vec<ExternalCommand>, PipelineError> {
    let reference_image = layout.source_gray(options.range.reference);
    let mut commands = Vec::with_capacity(options.range.count());
    for index in options.range.iter() {
        let mut builder = ResliceColorCommand::new(
            format!("reslice color {index:04}"),
            reference_image.clone(),
            layout.source_color(index),
            layout.composite_transform(index, options.range.reference),
            layout.resliced_color(index),
        )?;
        if let Some([ox, oy, sx, sy]) = options.volume.output_roi {
            builder.with_region([ox, oy], [sx, sy])?;
        }
        builder.with_inversion(options.registration.invert_multichannel)?;
        commands.push(builder.build()?);
    }
    Ok(commands)
}

/// The two stacking commands, grayscale volume first.
pub fn volumes(
    options: &PipelineOptions,
    layout: &WorkLayout,
) -> Result<Vec<ExternalCommand>, PipelineError> {
    let vol = &options.volume;
    let targets = [
        (
            "stack gray volume",
            layout.resliced_gray_mask(),
            layout.volume_gray(&options.volume_name),
        ),
        (
            "stack color volume",
            layout.resliced_color_mask(),
            layout.volume_color(&options.volume_name),
        ),
    ];
    let mut commands = Vec::with_capacity(targets.len());
    for (label, mask, output) in targets {
        let mut builder = StackCommand::new(label, mask, output, &options.range)?;
        builder.set("spacing", ParamValue::FloatVector(vol.spacing.to_vec()))?;
        builder.set("origin", ParamValue::FloatVector(vol.origin.to_vec()))?;
        builder.set("orientation", ParamValue::scalar(&vol.orientation_code))?;
        builder.set(
            "permutation",
            ParamValue::IntVector(vol.permutation_order.to_vec()),
        )?;
        builder.set("scalar_type", ParamValue::scalar(&vol.scalar_type))?;
        builder.set("interpolation", ParamValue::scalar(&vol.interpolation))?;
        if let Some(resample) = vol.resample {
            builder.set("resample", ParamValue::FloatVector(resample.to_vec()))?;
        }
        commands.push(builder.build()?);
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AdjacentPairing;
    use crate::command::registration::SimilarityMetric;
    use crate::range::SliceRange;

    fn options() -> PipelineOptions {
        let range = SliceRange::new(50, 70, 60).unwrap();
        PipelineOptions::new(range, "/data/raw", "/work")
    }

    fn layout(options: &PipelineOptions) -> WorkLayout {
        WorkLayout::from_options(options)
    }

    #[test]
    fn one_preparation_command_per_slice() {
        let options = options();
        let commands = source_slices(&options, &layout(&options)).unwrap();
        assert_eq!(commands.len(), 21);
        assert!(commands.iter().all(|c| c.program() == "slice_preprocess"));
        assert_eq!(commands[0].label(), "prepare slice 0050");
    }

    #[test]
    fn adjacency_produces_one_registration_per_slice() {
        let options = options();
        let policy = AdjacentPairing::new();
        let commands = partial_transforms(&options, &layout(&options), &policy).unwrap();
        assert_eq!(commands.len(), 21);
        assert!(commands
            .iter()
            .any(|c| c.label() == "register slice 0060 -> 0060"));
        assert!(commands
            .iter()
            .any(|c| c.label() == "register slice 0052 -> 0053"));
    }

    #[test]
    fn registration_commands_carry_the_configured_metric() {
        let mut options = options();
        options.registration.metric = SimilarityMetric::CC;
        options.registration.metric_parameter = 4;
        let policy = AdjacentPairing::new();
        let commands = partial_transforms(&options, &layout(&options), &policy).unwrap();
        let line = commands[0].shell_line();
        assert!(line.contains("CC["), "{line}");
        assert!(line.contains(",1,4]"), "{line}");
        assert!(line.contains("--MI-option 4x16000"), "{line}");
    }

    #[test]
    fn composite_above_reference_lists_transforms_moving_side_first() {
        let options = options();
        let resolver = AdjacentPairing::new();
        let commands = composite_transforms(&options, &layout(&options), &resolver).unwrap();
        let command = commands
            .iter()
            .find(|c| c.label() == "compose slice 0065")
            .unwrap();
        let expected: Vec<String> = [
            "/work/02_transforms/ct_m0065_f0060_Affine.txt",
            "/work/02_transforms/tr_m0065_f0064_Affine.txt",
            "/work/02_transforms/tr_m0064_f0063_Affine.txt",
            "/work/02_transforms/tr_m0063_f0062_Affine.txt",
            "/work/02_transforms/tr_m0062_f0061_Affine.txt",
            "/work/02_transforms/tr_m0061_f0060_Affine.txt",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(command.args()[1..], expected[..]);
    }

    #[test]
    fn composite_below_reference_also_starts_at_the_moving_slice() {
        let options = options();
        let resolver = AdjacentPairing::new();
        let commands = composite_transforms(&options, &layout(&options), &resolver).unwrap();
        let command = commands
            .iter()
            .find(|c| c.label() == "compose slice 0052")
            .unwrap();
        let inputs = &command.args()[2..];
        assert_eq!(inputs.len(), 8);
        assert!(inputs[0].ends_with("tr_m0052_f0053_Affine.txt"));
        assert!(inputs[7].ends_with("tr_m0059_f0060_Affine.txt"));
    }

    #[test]
    fn reference_composite_wraps_the_identity_transform() {
        let options = options();
        let resolver = AdjacentPairing::new();
        let commands = composite_transforms(&options, &layout(&options), &resolver).unwrap();
        let command = commands
            .iter()
            .find(|c| c.label() == "compose slice 0060")
            .unwrap();
        assert_eq!(
            command.args(),
            &[
                "2",
                "/work/02_transforms/ct_m0060_f0060_Affine.txt",
                "/work/02_transforms/tr_m0060_f0060_Affine.txt",
            ]
        );
    }

    #[test]
    fn reslice_commands_apply_the_composite_transform_per_slice() {
        let options = options();
        let gray = reslice_gray(&options, &layout(&options)).unwrap();
        assert_eq!(gray.len(), 21);
        let line = gray
            .iter()
            .find(|c| c.label() == "reslice gray 0065")
            .unwrap()
            .shell_line();
        assert!(line.contains("ct_m0065_f0060_Affine.txt"), "{line}");
        assert!(line.contains("/work/00_source_gray/0060.nii.gz"), "{line}");
    }

    #[test]
    fn color_reslice_consumes_color_sources_and_honors_inversion() {
        let mut options = options();
        options.registration.invert_multichannel = true;
        let color = reslice_color(&options, &layout(&options)).unwrap();
        assert_eq!(color.len(), 21);
        let line = color[0].shell_line();
        assert!(line.contains("/work/01_source_color/0050.nii.gz"), "{line}");
        assert!(line.contains("-scale -1 -shift 255"), "{line}");
    }

    #[test]
    fn output_roi_crops_both_reslice_batches() {
        let mut options = options();
        options.volume.output_roi = Some([10, 20, 512, 256]);
        let gray = reslice_gray(&options, &layout(&options)).unwrap();
        let color = reslice_color(&options, &layout(&options)).unwrap();
        assert!(gray[0].shell_line().contains("-region 10x20vox 512x256vox"));
        assert!(color[0].shell_line().contains("-region 10x20vox 512x256vox"));
    }

    #[test]
    fn volume_stage_stacks_gray_then_color() {
        let options = options();
        let commands = volumes(&options, &layout(&options)).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].label(), "stack gray volume");
        assert_eq!(commands[1].label(), "stack color volume");
        let line = commands[0].shell_line();
        assert!(line.contains("--stacking-range 50 70 1"), "{line}");
        assert!(line.contains("output_volume_gray.nii.gz"), "{line}");
    }

    #[test]
    fn planning_is_deterministic() {
        let options = options();
        let layout = layout(&options);
        let policy = AdjacentPairing::new();
        let first = partial_transforms(&options, &layout, &policy).unwrap();
        let second = partial_transforms(&options, &layout, &policy).unwrap();
        assert_eq!(first, second);
    }
}
