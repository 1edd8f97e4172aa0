//! vani-coverage: Pure raster-vector flood coverage engine (sans-IO).
//!
//! Measures how much of an agricultural field is flooded, given a flood
//! probability raster and the field's boundary:
//! threshold -> affine mapping -> polygon rasterization -> aggregation,
//! with optional tile discovery when no raster is supplied directly.
//!
//! This crate has **no I/O dependencies** and never logs. Models, field
//! catalogs and tile stores are injected through the traits in
//! [`capabilities`]; filesystem implementations live in `vani-io`.

pub mod affine;
pub mod aggregate;
pub mod assess;
pub mod capabilities;
pub mod config;
pub mod locate;
pub mod rasterize;
pub mod threshold;
pub mod types;

pub use affine::{AffineTransform, PixelPoint};
pub use aggregate::{aggregate, round_pct};
pub use assess::{
    Assessment, FieldAssessment, FieldClip, FieldOutcome, assess, assess_field, assess_image,
};
pub use capabilities::{FieldCatalog, LoadedTile, SegmentationModel, TileData, TileSource};
pub use config::CoverageConfig;
pub use locate::{
    LinearIndex, RTreeIndex, TileIndex, TileIndexKind, find_overlapping, find_overlapping_extent,
    overlaps,
};
pub use rasterize::{PolygonRasterizer, rasterize};
pub use threshold::threshold;
pub use types::{
    BinaryMask, CoverageError, CoverageResult, Dimensions, FieldPolygon, GeoBounds,
    ProbabilityGrid, SarImage, TileRecord,
};
