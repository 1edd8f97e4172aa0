//! Probability thresholding.
//!
//! Turns the segmentation model's per-pixel flood probabilities into a
//! binary flood mask. This is the first step of every assessment.

use crate::types::{BinaryMask, ProbabilityGrid};

/// Classify each cell as flooded when its probability is strictly
/// greater than `cutoff`.
///
/// A cell exactly equal to `cutoff` is dry. `NaN` cells are dry, and a
/// `NaN` cutoff yields an all-dry mask; neither panics. Values outside
/// `[0, 1]` are compared as given.
#[must_use = "returns the binary flood mask"]
pub fn threshold(grid: &ProbabilityGrid, cutoff: f64) -> BinaryMask {
    let dimensions = grid.dimensions();
    let mut mask = BinaryMask::filled(dimensions, false);
    for (cell, &value) in mask.cells_mut().iter_mut().zip(grid.values()) {
        *cell = value > cutoff;
    }
    mask
}
