//! vani-io: Filesystem collaborators for the vani coverage engine.
//!
//! Implements the engine's capability traits over files on disk:
//! - [`GeoJsonFieldCatalog`] -- field boundaries from GeoJSON,
//! - [`FsTileSource`] -- tiles listed in CSV manifests,
//! - [`raster`] -- probability grids and SAR images from PNG or JSON.
//!
//! All file access and logging for the workspace happens here or in the
//! CLI; `vani-coverage` stays pure.

pub mod error;
pub mod fields;
pub mod manifest;
pub mod raster;
pub mod tiles;

pub use error::IoError;
pub use fields::{FIELDS_FILE, GeoJsonFieldCatalog, discover_fields_file};
pub use manifest::{MANIFEST_FILES, REQUIRED_COLUMNS, read_manifest, read_manifest_dir};
pub use raster::{RasterFormat, read_probability_grid, read_sar_image, sar_image_from_images};
pub use tiles::FsTileSource;
