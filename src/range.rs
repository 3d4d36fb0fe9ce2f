//! Slice range domain description.
//!
//! The pipeline operates on an inclusive interval of slice indices with one
//! designated reference slice. The range is validated once at startup and
//! immutable afterwards; every other component treats it as ground truth.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Index of one slice in the input sequence.
///
/// Formatted zero-padded to four digits wherever it appears in a filename
/// (`0051.nii.gz`).
pub type SliceIndex = u32;

/// The inclusive slice interval under alignment and its reference slice.
///
/// The reference slice is the fixed point of every transform chain: all
/// other slices are mapped into its coordinate frame and its own transform
/// is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRange {
    /// First slice of the working set.
    pub start: SliceIndex,
    /// Last slice of the working set (inclusive).
    pub end: SliceIndex,
    /// Slice every chain terminates at.
    pub reference: SliceIndex,
}

impl SliceRange {
    /// Build a validated range. `start <= reference <= end` is required.
    pub fn new(
        start: SliceIndex,
        end: SliceIndex,
        reference: SliceIndex,
    ) -> Result<Self, PipelineError> {
        let range = Self {
            start,
            end,
            reference,
        };
        range.validate()?;
        Ok(range)
    }

    /// Re-check the invariants, e.g. after deserializing from a config file.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.start > self.end {
            return Err(PipelineError::config(format!(
                "slice range start {} exceeds end {}",
                self.start, self.end
            )));
        }
        if self.reference < self.start || self.reference > self.end {
            return Err(PipelineError::config(format!(
                "reference slice {} lies outside [{}, {}]",
                self.reference, self.start, self.end
            )));
        }
        Ok(())
    }

    /// Whether `index` belongs to the working set.
    pub fn contains(&self, index: SliceIndex) -> bool {
        index >= self.start && index <= self.end
    }

    /// Number of slices in the working set.
    pub fn count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    /// Ascending working set, `start..=end`.
    pub fn iter(&self) -> impl Iterator<Item = SliceIndex> {
        self.start..=self.end
    }
}
