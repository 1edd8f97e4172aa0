//! Caller-supplied engine configuration.

use serde::{Deserialize, Serialize};

use crate::locate::TileIndexKind;
use crate::types::CoverageError;

/// Configuration for a coverage assessment.
///
/// The engine is stateless; everything that varies between requests
/// is passed in here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Probability cutoff. A cell is flooded when its probability is
    /// strictly greater than this value.
    pub threshold: f64,

    /// How the tile catalog is searched when no raster is supplied.
    pub tile_index: TileIndexKind,
}

impl CoverageConfig {
    /// Default probability cutoff.
    pub const DEFAULT_THRESHOLD: f64 = 0.5;

    /// Default catalog search strategy.
    pub const DEFAULT_TILE_INDEX: TileIndexKind = TileIndexKind::Linear;

    /// Check that the configuration can be applied.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidConfig`] if `threshold` is not finite.
    pub fn validate(&self) -> Result<(), CoverageError> {
        if self.threshold.is_finite() {
            Ok(())
        } else {
            Err(CoverageError::InvalidConfig(format!(
                "threshold must be finite, got {}",
                self.threshold
            )))
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            tile_index: Self::DEFAULT_TILE_INDEX,
        }
    }
}
