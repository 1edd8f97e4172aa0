//! Error type for filesystem collaborators.

use std::path::PathBuf;

use vani_coverage::CoverageError;

/// Errors produced while reading field catalogs, manifests, or rasters.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("invalid JSON in {origin}: {source}")]
    Json {
        /// Where the document came from (a path, or `<string>`).
        origin: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A GeoJSON document could not be parsed.
    #[error("invalid GeoJSON in {origin}: {source}")]
    GeoJson {
        /// Where the document came from (a path, or `<string>`).
        origin: String,
        /// Underlying parse error.
        #[source]
        source: geojson::Error,
    },

    /// A GeoJSON document parsed, but is not a `FeatureCollection`.
    #[error("{origin}: expected a FeatureCollection, found a {found}")]
    NotFeatureCollection {
        /// Where the document came from.
        origin: String,
        /// The top-level GeoJSON object type found instead.
        found: &'static str,
    },

    /// An image could not be decoded.
    #[error("failed to decode image {path}: {source}")]
    Image {
        /// The image file.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: image::ImageError,
    },

    /// The raster file extension is not one we can decode.
    #[error("unsupported raster format: {0} (expected .png or .json)")]
    UnsupportedFormat(PathBuf),

    /// A field feature has malformed geometry.
    #[error("{origin}: invalid geometry for field {field_id}: {reason}")]
    Geometry {
        /// Where the catalog came from.
        origin: String,
        /// The offending field.
        field_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// None of the candidate roots holds a field catalog.
    #[error("no field catalog found; looked in: {}", .candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    FieldsNotFound {
        /// Every path that was tried.
        candidates: Vec<PathBuf>,
    },

    /// A manifest lacks one or more required columns.
    #[error("{path}: manifest missing columns: {}", .missing.join(", "))]
    ManifestMissingColumns {
        /// The manifest file.
        path: PathBuf,
        /// Required columns not present in the header.
        missing: Vec<String>,
    },

    /// No manifest files exist in the manifest directory.
    #[error("no tile manifests found in {0}")]
    NoManifests(PathBuf),

    /// The decoded data violates an engine invariant.
    #[error(transparent)]
    Coverage(#[from] CoverageError),
}
