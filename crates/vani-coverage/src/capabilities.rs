//! Collaborator interfaces the engine is driven through.
//!
//! The engine never loads models, reads catalogs, or touches the
//! filesystem itself. Callers inject these capabilities instead, which
//! keeps the geometric core deterministic and testable without weights
//! or files. `vani-io` provides filesystem-backed implementations.

use crate::types::{CoverageError, FieldPolygon, GeoBounds, ProbabilityGrid, SarImage, TileRecord};

/// Produces per-pixel flood probabilities from a SAR image.
pub trait SegmentationModel {
    /// Run inference on `image`.
    ///
    /// The returned grid should have the same dimensions as `image`.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::Inference`] if the model cannot run.
    fn infer(&self, image: &SarImage) -> Result<ProbabilityGrid, CoverageError>;
}

impl<F> SegmentationModel for F
where
    F: Fn(&SarImage) -> Result<ProbabilityGrid, CoverageError>,
{
    fn infer(&self, image: &SarImage) -> Result<ProbabilityGrid, CoverageError> {
        self(image)
    }
}

/// Read-only lookup of field boundaries by ID.
pub trait FieldCatalog {
    /// The field with this ID, if the catalog has one.
    fn lookup_field(&self, field_id: &str) -> Option<FieldPolygon>;
}

impl FieldCatalog for [FieldPolygon] {
    fn lookup_field(&self, field_id: &str) -> Option<FieldPolygon> {
        self.iter().find(|f| f.field_id() == field_id).cloned()
    }
}

impl FieldCatalog for Vec<FieldPolygon> {
    fn lookup_field(&self, field_id: &str) -> Option<FieldPolygon> {
        self.as_slice().lookup_field(field_id)
    }
}

/// Raster payload of a loaded tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileData {
    /// Precomputed flood probabilities, ready for thresholding.
    Probabilities(ProbabilityGrid),
    /// Raw SAR backscatter that still needs a [`SegmentationModel`].
    Image(SarImage),
}

/// A tile's raster together with the extent it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTile {
    /// The tile raster.
    pub data: TileData,
    /// Geographic extent of the raster.
    pub bounds: GeoBounds,
}

/// A catalog of pre-generated raster tiles.
pub trait TileSource {
    /// List every tile, in the order the source defines.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::CatalogUnavailable`] if the catalog
    /// cannot be read.
    fn load_catalog(&self) -> Result<Vec<TileRecord>, CoverageError>;

    /// Load the raster referenced by `record`.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::TileUnavailable`] if the raster cannot
    /// be found or decoded.
    fn load_tile(&self, record: &TileRecord) -> Result<LoadedTile, CoverageError>;
}
