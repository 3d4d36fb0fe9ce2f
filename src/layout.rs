//! Work directory and filename layout.
//!
//! Every artifact the pipeline reads or writes has a canonical location
//! derived from the work directory and the slice indices involved. The
//! names are deterministic, so re-running a stage overwrites its previous
//! outputs in place instead of accumulating new files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::PipelineOptions;
use crate::range::SliceIndex;

const SOURCE_GRAY_DIR: &str = "00_source_gray";
const SOURCE_COLOR_DIR: &str = "01_source_color";
const TRANSFORMS_DIR: &str = "02_transforms";
const RESLICED_GRAY_DIR: &str = "03_gray_resliced";
const RESLICED_COLOR_DIR: &str = "04_color_resliced";
const VOLUMES_DIR: &str = "05_output_volumes";

/// Filename extension shared by all image artifacts.
const IMAGE_EXT: &str = "nii.gz";

/// Canonical artifact locations for one pipeline run.
#[derive(Debug, Clone)]
pub struct WorkLayout {
    input_dir: PathBuf,
    source_gray: PathBuf,
    source_color: PathBuf,
    transforms: PathBuf,
    resliced_gray: PathBuf,
    resliced_color: PathBuf,
    volumes: PathBuf,
}

impl WorkLayout {
    pub fn new(input_dir: impl Into<PathBuf>, work_dir: impl AsRef<Path>) -> Self {
        let work = work_dir.as_ref();
        Self {
            input_dir: input_dir.into(),
            source_gray: work.join(SOURCE_GRAY_DIR),
            source_color: work.join(SOURCE_COLOR_DIR),
            transforms: work.join(TRANSFORMS_DIR),
            resliced_gray: work.join(RESLICED_GRAY_DIR),
            resliced_color: work.join(RESLICED_COLOR_DIR),
            volumes: work.join(VOLUMES_DIR),
        }
    }

    /// Layout for `options`, honoring the transform and volume directory
    /// overrides when present.
    pub fn from_options(options: &PipelineOptions) -> Self {
        let mut layout = Self::new(&options.input_dir, &options.work_dir);
        if let Some(dir) = &options.transforms_dir {
            layout.transforms = dir.clone();
        }
        if let Some(dir) = &options.output_dir {
            layout.volumes = dir.clone();
        }
        layout
    }

    /// Create every work subdirectory that does not exist yet.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            &self.source_gray,
            &self.source_color,
            &self.transforms,
            &self.resliced_gray,
            &self.resliced_color,
            &self.volumes,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Raw input slice as delivered by the acquisition step.
    pub fn raw_slice(&self, index: SliceIndex) -> PathBuf {
        self.input_dir.join(format!("{index:04}.{IMAGE_EXT}"))
    }

    /// Grayscale slice used as registration input.
    pub fn source_gray(&self, index: SliceIndex) -> PathBuf {
        self.source_gray.join(format!("{index:04}.{IMAGE_EXT}"))
    }

    /// Color slice resliced into the final volume.
    pub fn source_color(&self, index: SliceIndex) -> PathBuf {
        self.source_color.join(format!("{index:04}.{IMAGE_EXT}"))
    }

    /// Output prefix handed to the registration engine. The engine appends
    /// `Affine.txt` to it.
    pub fn partial_prefix(&self, moving: SliceIndex, fixed: SliceIndex) -> PathBuf {
        self.transforms
            .join(format!("tr_m{moving:04}_f{fixed:04}_"))
    }

    /// Partial transform written by one pairwise registration.
    pub fn partial_transform(&self, moving: SliceIndex, fixed: SliceIndex) -> PathBuf {
        self.transforms
            .join(format!("tr_m{moving:04}_f{fixed:04}_Affine.txt"))
    }

    /// Composed transform mapping a slice into the reference frame.
    pub fn composite_transform(&self, moving: SliceIndex, reference: SliceIndex) -> PathBuf {
        self.transforms
            .join(format!("ct_m{moving:04}_f{reference:04}_Affine.txt"))
    }

    /// Resliced grayscale slice.
    pub fn resliced_gray(&self, index: SliceIndex) -> PathBuf {
        self.resliced_gray.join(format!("{index:04}.{IMAGE_EXT}"))
    }

    /// Resliced color slice.
    pub fn resliced_color(&self, index: SliceIndex) -> PathBuf {
        self.resliced_color.join(format!("{index:04}.{IMAGE_EXT}"))
    }

    /// Printf-style mask the stacker expands over the slice range.
    pub fn resliced_gray_mask(&self) -> PathBuf {
        self.resliced_gray.join(format!("%04d.{IMAGE_EXT}"))
    }

    /// Color counterpart of [`resliced_gray_mask`](Self::resliced_gray_mask).
    pub fn resliced_color_mask(&self) -> PathBuf {
        self.resliced_color.join(format!("%04d.{IMAGE_EXT}"))
    }

    /// Assembled grayscale volume.
    pub fn volume_gray(&self, name: &str) -> PathBuf {
        self.volumes.join(format!("{name}_gray.{IMAGE_EXT}"))
    }

    /// Assembled color volume.
    pub fn volume_color(&self, name: &str) -> PathBuf {
        self.volumes.join(format!("{name}_color.{IMAGE_EXT}"))
    }
}
