//! Filesystem-backed [`TileSource`].
//!
//! The catalog is the concatenation of the manifests in a manifest
//! directory. Each record's `image_path` names a probability raster
//! (`.png` or `.json`): absolute paths and paths relative to the working
//! directory are tried first, then paths relative to the project root.

use std::path::{Path, PathBuf};

use vani_coverage::{CoverageError, LoadedTile, TileData, TileRecord, TileSource};

use crate::manifest::read_manifest_dir;
use crate::raster::read_probability_grid;

/// Tiles listed in CSV manifests and stored as files.
#[derive(Debug, Clone)]
pub struct FsTileSource {
    manifest_dir: PathBuf,
    project_root: Option<PathBuf>,
}

impl FsTileSource {
    /// A source reading manifests from `manifest_dir`.
    #[must_use]
    pub fn new(manifest_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            project_root: None,
        }
    }

    /// Also resolve tile paths relative to `root`.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// The manifest directory.
    #[must_use]
    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    /// Locate the file behind a tile's data reference, if it exists.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(reference);
        if direct.is_file() {
            return Some(direct);
        }
        self.project_root
            .as_ref()
            .map(|root| root.join(reference))
            .filter(|path| path.is_file())
    }
}

impl TileSource for FsTileSource {
    fn load_catalog(&self) -> Result<Vec<TileRecord>, CoverageError> {
        read_manifest_dir(&self.manifest_dir)
            .map_err(|e| CoverageError::CatalogUnavailable(e.to_string()))
    }

    fn load_tile(&self, record: &TileRecord) -> Result<LoadedTile, CoverageError> {
        let unavailable = |reason: String| CoverageError::TileUnavailable {
            reference: record.data_reference.clone(),
            reason,
        };
        let path = self
            .resolve(&record.data_reference)
            .ok_or_else(|| unavailable("not found on disk".to_owned()))?;
        tracing::debug!(reference = %record.data_reference, path = %path.display(), "loading tile");
        let grid = read_probability_grid(&path).map_err(|e| unavailable(e.to_string()))?;
        Ok(LoadedTile {
            data: TileData::Probabilities(grid),
            bounds: record.bounds,
        })
    }
}
