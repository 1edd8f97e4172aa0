//! Synthetic flood tile for trying the pipeline without real data.

use vani_coverage::{CoverageError, Dimensions, ProbabilityGrid};

/// Default demo tile edge length in pixels.
pub const DEFAULT_SIZE: u32 = 256;

/// Width, in pixels, of the probability ramp at the patch edge.
const EDGE_SOFTNESS: f64 = 2.0;

/// Default patch radius for a tile of `size` pixels.
#[must_use]
pub fn default_radius(size: u32) -> f64 {
    f64::from(size) / 6.0
}

/// A `size` × `size` probability grid with a circular flood patch of
/// `radius` pixels in the centre.
///
/// Probability falls off logistically across the patch edge and is
/// exactly 0.5 on the circle itself.
///
/// # Errors
///
/// Returns [`CoverageError::EmptyGrid`] if `size` is zero.
pub fn circular_patch(size: u32, radius: f64) -> Result<ProbabilityGrid, CoverageError> {
    let centre = f64::from(size) / 2.0;
    ProbabilityGrid::from_fn(Dimensions::new(size, size), |row, col| {
        let dy = f64::from(row) + 0.5 - centre;
        let dx = f64::from(col) + 0.5 - centre;
        let distance = dx.hypot(dy);
        1.0 / (1.0 + ((distance - radius) / EDGE_SOFTNESS).exp())
    })
}
