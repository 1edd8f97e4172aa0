//! JSON coverage report.
//!
//! The report is the machine-readable result of one assessment: the
//! rounded percentages, the exact pixel counts behind them, where the
//! raster sits on the map, and a fingerprint of the flood mask so a
//! stored report can be checked against a re-run.

use std::fmt;

use serde::{Deserialize, Serialize};
use vani_coverage::{Assessment, Dimensions, GeoBounds};

use crate::ExportError;

/// Serializable summary of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Percentage of the whole raster classified as flooded.
    pub flooded_pct: f64,

    /// Percentage of the field classified as flooded; `null` when no
    /// field was given or its footprint is empty.
    pub flooded_pct_in_field: Option<f64>,

    /// Raster cells inside the field.
    pub pixel_count_in_field: u64,

    /// Flooded cells in the whole raster.
    pub flooded_pixel_count: u64,

    /// Cells in the whole raster.
    pub total_pixel_count: u64,

    /// Raster dimensions.
    pub dimensions: Dimensions,

    /// Probability cutoff used.
    pub threshold: f64,

    /// Raster extent as `[south, west, north, east]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,

    /// Field the percentage is clipped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,

    /// Tile file the raster came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_path: Option<String>,

    /// [`BinaryMask::fingerprint`](vani_coverage::BinaryMask::fingerprint)
    /// of the flood mask, as 16 hex digits.
    pub mask_fingerprint: String,
}

impl CoverageReport {
    /// Summarize `assessment`, made with cutoff `threshold`.
    #[must_use]
    pub fn new(assessment: &Assessment, threshold: f64) -> Self {
        let coverage = &assessment.coverage;
        Self {
            flooded_pct: coverage.flooded_pct_whole,
            flooded_pct_in_field: coverage.flooded_pct_in_field,
            pixel_count_in_field: coverage.pixel_count_in_field,
            flooded_pixel_count: coverage.flooded_pixel_count,
            total_pixel_count: coverage.total_pixel_count,
            dimensions: assessment.flood_mask.dimensions(),
            threshold,
            bounds: None,
            field_id: None,
            tile_path: None,
            mask_fingerprint: format!("{:016x}", assessment.flood_mask.fingerprint()),
        }
    }

    /// Record the raster extent.
    #[must_use]
    pub const fn with_bounds(mut self, bounds: GeoBounds) -> Self {
        self.bounds = Some(bounds.to_array());
        self
    }

    /// Record the field ID.
    #[must_use]
    pub fn with_field_id(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }

    /// Record the tile file.
    #[must_use]
    pub fn with_tile_path(mut self, tile_path: impl Into<String>) -> Self {
        self.tile_path = Some(tile_path.into());
        self
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Human-readable multi-line summary.
impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "flooded:           {:.2}% ({} of {} px, {})",
            self.flooded_pct, self.flooded_pixel_count, self.total_pixel_count, self.dimensions
        )?;
        if let Some(field_id) = &self.field_id {
            match self.flooded_pct_in_field {
                Some(pct) => writeln!(
                    f,
                    "flooded in field:  {pct:.2}% (field {field_id}, {} px)",
                    self.pixel_count_in_field
                )?,
                None => writeln!(f, "flooded in field:  n/a (field {field_id} covers no pixels)")?,
            }
        }
        if let Some([south, west, north, east]) = self.bounds {
            writeln!(f, "bounds:            S {south} W {west} N {north} E {east}")?;
        }
        if let Some(tile_path) = &self.tile_path {
            writeln!(f, "tile:              {tile_path}")?;
        }
        writeln!(f, "threshold:         {}", self.threshold)?;
        write!(f, "mask fingerprint:  {}", self.mask_fingerprint)
    }
}
