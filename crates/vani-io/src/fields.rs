//! Field boundaries from a GeoJSON `FeatureCollection`.
//!
//! Each feature carries its ID in `properties.field_id`, as a string or
//! a number. IDs are compared by their string form, so `"7"` and `7`
//! name the same field. `Polygon` and `MultiPolygon` geometries are
//! supported; features with any other geometry, or without an ID, are
//! skipped with a warning. Parsing and geometry conversion are done by
//! the `geojson` crate.

use std::path::{Path, PathBuf};

use geo::{Geometry, MultiPolygon};
use geojson::{Feature, GeoJson};
use serde_json::Value;
use vani_coverage::{FieldCatalog, FieldPolygon};

use crate::error::IoError;

/// Location of the field catalog relative to a project root.
pub const FIELDS_FILE: &str = "data/sample_fields.geojson";

/// Field catalog backed by a GeoJSON file, held in memory.
#[derive(Debug, Clone, Default)]
pub struct GeoJsonFieldCatalog {
    fields: Vec<FieldPolygon>,
}

impl GeoJsonFieldCatalog {
    /// Read and parse a GeoJSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Read`] if the file cannot be read,
    /// [`IoError::GeoJson`] if it is not valid GeoJSON,
    /// [`IoError::NotFeatureCollection`] if the top-level object is a
    /// lone feature or geometry, or [`IoError::Geometry`] if a feature's
    /// geometry cannot be converted.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let json = std::fs::read_to_string(path).map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&json, &path.display().to_string())?;
        tracing::debug!(path = %path.display(), fields = catalog.len(), "loaded field catalog");
        Ok(catalog)
    }

    /// Parse a GeoJSON document held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the read error.
    pub fn parse(json: &str) -> Result<Self, IoError> {
        Self::from_json(json, "<string>")
    }

    fn from_json(json: &str, origin: &str) -> Result<Self, IoError> {
        let document = json.parse::<GeoJson>().map_err(|source| IoError::GeoJson {
            origin: origin.to_owned(),
            source,
        })?;
        let collection = match document {
            GeoJson::FeatureCollection(collection) => collection,
            GeoJson::Feature(_) => {
                return Err(IoError::NotFeatureCollection {
                    origin: origin.to_owned(),
                    found: "Feature",
                });
            }
            GeoJson::Geometry(_) => {
                return Err(IoError::NotFeatureCollection {
                    origin: origin.to_owned(),
                    found: "Geometry",
                });
            }
        };

        let mut fields = Vec::with_capacity(collection.features.len());
        for (index, feature) in collection.features.into_iter().enumerate() {
            let Some(field_id) = field_id_of(&feature) else {
                tracing::warn!(origin, index, "skipping feature without a field_id");
                continue;
            };
            let Some(geometry) = polygons(feature, origin, &field_id)? else {
                tracing::warn!(origin, %field_id, "skipping feature without polygon geometry");
                continue;
            };
            fields.push(FieldPolygon::new(field_id, geometry));
        }
        Ok(Self { fields })
    }

    /// All fields, in file order.
    #[must_use]
    pub fn fields(&self) -> &[FieldPolygon] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the catalog holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldCatalog for GeoJsonFieldCatalog {
    /// The first field in file order with this ID.
    fn lookup_field(&self, field_id: &str) -> Option<FieldPolygon> {
        self.fields.lookup_field(field_id)
    }
}

/// String form of `properties.field_id`.
fn field_id_of(feature: &Feature) -> Option<String> {
    match feature.property("field_id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The feature's geometry as polygons, or `None` if it has no geometry
/// or a non-polygonal one.
fn polygons(
    feature: Feature,
    origin: &str,
    field_id: &str,
) -> Result<Option<MultiPolygon<f64>>, IoError> {
    let Some(geometry) = feature.geometry else {
        return Ok(None);
    };
    let geometry = Geometry::<f64>::try_from(geometry).map_err(|e| IoError::Geometry {
        origin: origin.to_owned(),
        field_id: field_id.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Some(multi),
        _ => None,
    })
}

/// Find the field catalog under the first root that has one.
///
/// Roots are searched in order for [`FIELDS_FILE`].
///
/// # Errors
///
/// Returns [`IoError::FieldsNotFound`] listing every path tried if no
/// root holds the file.
pub fn discover_fields_file<P: AsRef<Path>>(
    roots: impl IntoIterator<Item = P>,
) -> Result<PathBuf, IoError> {
    let mut candidates = Vec::new();
    for root in roots {
        let candidate = root.as_ref().join(FIELDS_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        candidates.push(candidate);
    }
    Err(IoError::FieldsNotFound { candidates })
}
