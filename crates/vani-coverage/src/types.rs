//! Shared types for the vani flood coverage engine.
//!
//! Every value here is transient: constructed per request from caller
//! inputs, consumed by the engine, and dropped once a
//! [`CoverageResult`] has been produced.

use std::fmt;
use std::hash::Hasher;

use geo::{BoundingRect, Coord, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels (number of columns).
    pub width: u32,
    /// Height in pixels (number of rows).
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of cells (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of cells as a `usize`, for buffer allocation.
    pub(crate) const fn cell_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ───────────────────────────── GeoBounds ─────────────────────────────

/// Rectangular geographic extent in longitude/latitude.
///
/// Invariant: all four coordinates are finite, `south < north` and
/// `west < east`. The invariant is checked on construction and on
/// deserialization, so a `GeoBounds` value is always well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoBoundsProxy")]
pub struct GeoBounds {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

/// Unvalidated serde mirror of [`GeoBounds`].
#[derive(Deserialize)]
struct GeoBoundsProxy {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl TryFrom<GeoBoundsProxy> for GeoBounds {
    type Error = CoverageError;

    fn try_from(proxy: GeoBoundsProxy) -> Result<Self, Self::Error> {
        Self::new(proxy.south, proxy.west, proxy.north, proxy.east)
    }
}

impl GeoBounds {
    /// Create validated bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidBounds`] if any coordinate is not
    /// finite, if `south >= north`, or if `west >= east`.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, CoverageError> {
        if ![south, west, north, east].iter().all(|v| v.is_finite()) {
            return Err(CoverageError::InvalidBounds(format!(
                "coordinates must be finite, got [{south}, {west}, {north}, {east}]"
            )));
        }
        if south >= north {
            return Err(CoverageError::InvalidBounds(format!(
                "south ({south}) must be less than north ({north})"
            )));
        }
        if west >= east {
            return Err(CoverageError::InvalidBounds(format!(
                "west ({west}) must be less than east ({east})"
            )));
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Southern edge (minimum latitude).
    #[must_use]
    pub const fn south(&self) -> f64 {
        self.south
    }

    /// Western edge (minimum longitude).
    #[must_use]
    pub const fn west(&self) -> f64 {
        self.west
    }

    /// Northern edge (maximum latitude).
    #[must_use]
    pub const fn north(&self) -> f64 {
        self.north
    }

    /// Eastern edge (maximum longitude).
    #[must_use]
    pub const fn east(&self) -> f64 {
        self.east
    }

    /// Longitude span (`east - west`), always positive.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Latitude span (`north - south`), always positive.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// The `[south, west, north, east]` quadruple used by the request layer.
    #[must_use]
    pub const fn to_array(&self) -> [f64; 4] {
        [self.south, self.west, self.north, self.east]
    }

    /// Closed-interval rectangle overlap test.
    ///
    /// Rectangles that merely touch along an edge or at a corner
    /// overlap. The test is symmetric.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.overlaps_rect(&other.to_rect())
    }

    /// Closed-interval overlap with a rectangle that may have zero width
    /// or height, such as the bounding box of a line-shaped field.
    #[must_use]
    pub fn overlaps_rect(&self, rect: &Rect<f64>) -> bool {
        self.west <= rect.max().x
            && self.east >= rect.min().x
            && self.south <= rect.max().y
            && self.north >= rect.min().y
    }

    /// The same extent as a `geo` rectangle (`x` = longitude).
    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.west,
                y: self.south,
            },
            Coord {
                x: self.east,
                y: self.north,
            },
        )
    }

    /// Bounding box of a geometry.
    ///
    /// Returns `None` for an empty geometry or one with zero extent on
    /// either axis (a point or an axis-aligned line), since such a box
    /// cannot satisfy the `GeoBounds` invariant.
    #[must_use]
    pub fn enclosing(geometry: &MultiPolygon<f64>) -> Option<Self> {
        let rect = geometry.bounding_rect()?;
        Self::new(rect.min().y, rect.min().x, rect.max().y, rect.max().x).ok()
    }
}

impl TryFrom<[f64; 4]> for GeoBounds {
    type Error = CoverageError;

    /// Build from a `[south, west, north, east]` quadruple.
    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        let [south, west, north, east] = value;
        Self::new(south, west, north, east)
    }
}

// ─────────────────────────── ProbabilityGrid ─────────────────────────

/// Row-major grid of per-pixel flood probabilities.
///
/// Values are nominally in `[0, 1]` but are stored as given: nothing is
/// clamped and `NaN` is allowed. The grid always has a non-zero area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProbabilityGridProxy")]
pub struct ProbabilityGrid {
    dimensions: Dimensions,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct ProbabilityGridProxy {
    dimensions: Dimensions,
    values: Vec<f64>,
}

impl TryFrom<ProbabilityGridProxy> for ProbabilityGrid {
    type Error = CoverageError;

    fn try_from(proxy: ProbabilityGridProxy) -> Result<Self, Self::Error> {
        Self::new(proxy.dimensions, proxy.values)
    }
}

impl ProbabilityGrid {
    /// Create a grid from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::EmptyGrid`] if either dimension is zero.
    /// Returns [`CoverageError::InvalidGrid`] if `values.len()` is not
    /// `width * height`.
    pub fn new(dimensions: Dimensions, values: Vec<f64>) -> Result<Self, CoverageError> {
        if dimensions.is_empty() {
            return Err(CoverageError::EmptyGrid);
        }
        if values.len() != dimensions.cell_count() {
            return Err(CoverageError::InvalidGrid(format!(
                "{dimensions} grid needs {} values, got {}",
                dimensions.cell_count(),
                values.len(),
            )));
        }
        Ok(Self { dimensions, values })
    }

    /// Create a grid from nested rows (outer index = row).
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::EmptyGrid`] if there are no rows or the
    /// first row is empty. Returns [`CoverageError::InvalidGrid`] if the
    /// rows have differing lengths or exceed `u32` dimensions.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, CoverageError> {
        let Some(first) = rows.first() else {
            return Err(CoverageError::EmptyGrid);
        };
        let width = first.len();
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(CoverageError::InvalidGrid(format!(
                "row {index} has {} values, expected {width}",
                row.len(),
            )));
        }
        let to_u32 = |n: usize| {
            u32::try_from(n)
                .map_err(|_| CoverageError::InvalidGrid(format!("dimension {n} exceeds u32")))
        };
        let dimensions = Dimensions::new(to_u32(width)?, to_u32(rows.len())?);
        Self::new(dimensions, rows.concat())
    }

    /// Create a grid by evaluating `f(row, col)` for every cell.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::EmptyGrid`] if either dimension is zero.
    pub fn from_fn(
        dimensions: Dimensions,
        mut f: impl FnMut(u32, u32) -> f64,
    ) -> Result<Self, CoverageError> {
        if dimensions.is_empty() {
            return Err(CoverageError::EmptyGrid);
        }
        let mut values = Vec::with_capacity(dimensions.cell_count());
        for row in 0..dimensions.height {
            for col in 0..dimensions.width {
                values.push(f(row, col));
            }
        }
        Ok(Self { dimensions, values })
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Value at (`row`, `col`), or `None` when out of range.
    #[must_use]
    pub fn get(&self, row: u32, col: u32) -> Option<f64> {
        if row >= self.dimensions.height || col >= self.dimensions.width {
            return None;
        }
        self.values
            .get(row as usize * self.dimensions.width as usize + col as usize)
            .copied()
    }

    /// All values in row-major order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.dimensions.width as usize)
    }
}

// ───────────────────────────── BinaryMask ────────────────────────────

/// Fixed keys for [`BinaryMask::fingerprint`]. Changing them changes
/// every fingerprint ever recorded.
const FINGERPRINT_KEYS: (u64, u64) = (0x7661_6e69_6d61_736b, 0x666c_6f6f_6463_6f76);

/// Row-major grid of booleans with the same shape as the grid or
/// raster context it was derived from.
///
/// Unlike [`ProbabilityGrid`], a mask may have zero area; combining it
/// is rejected later by [`aggregate`](crate::aggregate::aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BinaryMaskProxy")]
pub struct BinaryMask {
    dimensions: Dimensions,
    cells: Vec<bool>,
}

#[derive(Deserialize)]
struct BinaryMaskProxy {
    dimensions: Dimensions,
    cells: Vec<bool>,
}

impl TryFrom<BinaryMaskProxy> for BinaryMask {
    type Error = CoverageError;

    fn try_from(proxy: BinaryMaskProxy) -> Result<Self, Self::Error> {
        Self::new(proxy.dimensions, proxy.cells)
    }
}

impl BinaryMask {
    /// Create a mask from row-major cells.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidGrid`] if `cells.len()` is not
    /// `width * height`.
    pub fn new(dimensions: Dimensions, cells: Vec<bool>) -> Result<Self, CoverageError> {
        if cells.len() != dimensions.cell_count() {
            return Err(CoverageError::InvalidGrid(format!(
                "{dimensions} mask needs {} cells, got {}",
                dimensions.cell_count(),
                cells.len(),
            )));
        }
        Ok(Self { dimensions, cells })
    }

    /// A mask with every cell set to `value`.
    #[must_use]
    pub fn filled(dimensions: Dimensions, value: bool) -> Self {
        Self {
            dimensions,
            cells: vec![value; dimensions.cell_count()],
        }
    }

    /// Create a mask by evaluating `f(row, col)` for every cell.
    #[must_use]
    pub fn from_fn(dimensions: Dimensions, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut cells = Vec::with_capacity(dimensions.cell_count());
        for row in 0..dimensions.height {
            for col in 0..dimensions.width {
                cells.push(f(row, col));
            }
        }
        Self { dimensions, cells }
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Cell at (`row`, `col`), or `None` when out of range.
    #[must_use]
    pub fn get(&self, row: u32, col: u32) -> Option<bool> {
        if row >= self.dimensions.height || col >= self.dimensions.width {
            return None;
        }
        self.cells
            .get(row as usize * self.dimensions.width as usize + col as usize)
            .copied()
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [bool] {
        &mut self.cells
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        // `chunks` panics on zero; a zero-width mask has no cells anyway.
        self.cells.chunks(self.dimensions.width.max(1) as usize)
    }

    /// Number of `true` cells.
    #[must_use]
    pub fn count_true(&self) -> u64 {
        self.cells.iter().map(|&c| u64::from(c)).sum()
    }

    /// Number of cells that are `true` in both `self` and `other`.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::ShapeMismatch`] if the dimensions differ.
    pub fn count_both(&self, other: &Self) -> Result<u64, CoverageError> {
        if self.dimensions != other.dimensions {
            return Err(CoverageError::ShapeMismatch {
                expected: self.dimensions,
                actual: other.dimensions,
            });
        }
        Ok(self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(&a, &b)| u64::from(a && b))
            .sum())
    }

    /// Deterministic 64-bit hash of the mask shape and bits.
    ///
    /// Uses SipHash-1-3 with fixed keys, so the value is stable across
    /// runs, processes, and platforms and can be recorded as evidence
    /// alongside a coverage result.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(FINGERPRINT_KEYS.0, FINGERPRINT_KEYS.1);
        hasher.write_u32(self.dimensions.width);
        hasher.write_u32(self.dimensions.height);
        for chunk in self.cells.chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (bit, &cell)| acc | (u8::from(cell) << bit));
            hasher.write_u8(byte);
        }
        hasher.finish()
    }
}

// ──────────────────────── Vector and catalog data ────────────────────

/// A field boundary: one or more polygons (each possibly with holes)
/// identified by a field ID.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPolygon {
    field_id: String,
    geometry: MultiPolygon<f64>,
}

impl FieldPolygon {
    /// Create a field polygon from any polygonal geometry.
    #[must_use]
    pub fn new(field_id: impl Into<String>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            field_id: field_id.into(),
            geometry: geometry.into(),
        }
    }

    /// The field identifier.
    #[must_use]
    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// The field geometry in longitude/latitude.
    #[must_use]
    pub const fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Bounding box of the field, or `None` if it has no extent.
    #[must_use]
    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::enclosing(&self.geometry)
    }

    /// Closed bounding rectangle of the field, or `None` if the geometry
    /// has no coordinates.
    ///
    /// Unlike [`bounds`](Self::bounds) the rectangle may have zero width
    /// or height.
    #[must_use]
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// Metadata for one pre-generated raster tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Geographic extent covered by the tile.
    pub bounds: GeoBounds,
    /// Opaque handle the tile source understands (usually a path).
    pub data_reference: String,
}

impl TileRecord {
    /// Create a tile record.
    #[must_use]
    pub fn new(bounds: GeoBounds, data_reference: impl Into<String>) -> Self {
        Self {
            bounds,
            data_reference: data_reference.into(),
        }
    }
}

/// Two-channel (VV, VH) SAR backscatter image, the segmentation model's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarImage {
    dimensions: Dimensions,
    vv: Vec<f32>,
    vh: Vec<f32>,
}

impl SarImage {
    /// Create an image from two row-major channels.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::EmptyGrid`] if either dimension is zero.
    /// Returns [`CoverageError::InvalidGrid`] if either channel does not
    /// hold exactly `width * height` values.
    pub fn new(dimensions: Dimensions, vv: Vec<f32>, vh: Vec<f32>) -> Result<Self, CoverageError> {
        if dimensions.is_empty() {
            return Err(CoverageError::EmptyGrid);
        }
        for (name, channel) in [("vv", &vv), ("vh", &vh)] {
            if channel.len() != dimensions.cell_count() {
                return Err(CoverageError::InvalidGrid(format!(
                    "{name} channel needs {} values for {dimensions}, got {}",
                    dimensions.cell_count(),
                    channel.len(),
                )));
            }
        }
        Ok(Self { dimensions, vv, vh })
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// VV-polarisation channel, row-major.
    #[must_use]
    pub fn vv(&self) -> &[f32] {
        &self.vv
    }

    /// VH-polarisation channel, row-major.
    #[must_use]
    pub fn vh(&self) -> &[f32] {
        &self.vh
    }
}

/// Flooded-area percentages for one raster, optionally restricted to a field.
///
/// Percentages are rounded to two decimal places; counts are exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    /// Percentage of all raster cells classified as flooded.
    pub flooded_pct_whole: f64,
    /// Percentage of the field's cells classified as flooded.
    ///
    /// `None` when no field was supplied or the field's rasterized
    /// footprint is empty. Absent is not the same as zero.
    pub flooded_pct_in_field: Option<f64>,
    /// Number of raster cells inside the field.
    pub pixel_count_in_field: u64,
    /// Number of flooded cells in the whole raster.
    pub flooded_pixel_count: u64,
    /// Number of cells in the whole raster.
    pub total_pixel_count: u64,
}

// ──────────────────────────────── Errors ─────────────────────────────

/// Errors produced by the coverage engine.
///
/// Absence of data (no overlapping tile, an empty field footprint,
/// `NaN` probabilities) is not an error; it is represented in the
/// returned values instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoverageError {
    /// Geographic bounds or raster dimensions are malformed.
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    /// A raster with zero width or height was supplied.
    #[error("raster grid has zero area")]
    EmptyGrid,

    /// Two grids of different dimensions were combined.
    #[error("grid shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Dimensions of the reference grid.
        expected: Dimensions,
        /// Dimensions of the offending grid.
        actual: Dimensions,
    },

    /// Grid data does not match its declared shape.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// The field catalog has no field with this ID.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// Engine configuration is invalid.
    #[error("invalid coverage configuration: {0}")]
    InvalidConfig(String),

    /// A tile source could not list its catalog.
    #[error("tile catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A tile source could not provide the referenced tile.
    #[error("tile {reference} unavailable: {reason}")]
    TileUnavailable {
        /// The tile's data reference.
        reference: String,
        /// Human-readable cause reported by the tile source.
        reason: String,
    },

    /// The segmentation model failed.
    #[error("segmentation inference failed: {0}")]
    Inference(String),
}
