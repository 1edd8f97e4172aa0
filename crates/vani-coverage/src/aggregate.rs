//! Flooded-area percentages from a flood mask and an optional field mask.

use crate::types::{BinaryMask, CoverageError, CoverageResult};

/// Round a percentage to two decimal places.
///
/// Only applied when a [`CoverageResult`] is built; all intermediate
/// arithmetic runs in full precision. Halves round away from zero.
#[must_use]
pub fn round_pct(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    100.0 * part as f64 / whole as f64
}

/// Compute whole-raster and field-restricted flooded percentages.
///
/// `flooded_pct_in_field` is the share of the field's cells that are
/// flooded. It is `None` when `polygon_mask` is `None` or has no `true`
/// cells, which happens for fields outside the raster or too small to
/// cover any pixel centre.
///
/// # Errors
///
/// Returns [`CoverageError::EmptyGrid`] if `flood_mask` has zero area.
/// Returns [`CoverageError::ShapeMismatch`] if `polygon_mask` has
/// different dimensions from `flood_mask`.
pub fn aggregate(
    flood_mask: &BinaryMask,
    polygon_mask: Option<&BinaryMask>,
) -> Result<CoverageResult, CoverageError> {
    let total = flood_mask.dimensions().pixel_count();
    if total == 0 {
        return Err(CoverageError::EmptyGrid);
    }
    let flooded = flood_mask.count_true();

    let (flooded_pct_in_field, pixel_count_in_field) = match polygon_mask {
        Some(polygon_mask) => {
            let flooded_in_field = flood_mask.count_both(polygon_mask)?;
            let in_field = polygon_mask.count_true();
            let pct = (in_field > 0).then(|| round_pct(percent(flooded_in_field, in_field)));
            (pct, in_field)
        }
        None => (None, 0),
    };

    Ok(CoverageResult {
        flooded_pct_whole: round_pct(percent(flooded, total)),
        flooded_pct_in_field,
        pixel_count_in_field,
        flooded_pixel_count: flooded,
        total_pixel_count: total,
    })
}
