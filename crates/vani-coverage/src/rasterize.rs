//! Polygon rasterization: burn a field boundary into the raster grid.
//!
//! A pixel belongs to the polygon when its centre is inside under the
//! even-odd rule. Each pixel row is handled as one scanline through the
//! row's centre: ring edges are intersected with the scanline (half-open
//! in `y`, so a vertex shared by two edges is counted once), the
//! crossings are sorted and paired, and a pixel is filled when its
//! centre lies in `[enter, exit)`.
//!
//! Holes fall out of the parity rule. The polygons of a multipolygon are
//! rasterized separately and OR-ed together, so overlapping parts never
//! cancel each other out.
//!
//! Every row depends only on the edge list and its own scanline, so the
//! result is bit-identical across runs and a raster can be produced in
//! independent row blocks with [`PolygonRasterizer::rasterize_rows`].

use std::ops::Range;

use geo::{LineString, MultiPolygon, Polygon};

use crate::affine::AffineTransform;
use crate::types::{BinaryMask, Dimensions, FieldPolygon};

/// A ring edge in pixel space (`x` = column, `y` = row).
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Edge {
    /// Column where this edge crosses the horizontal line `y`, if it does.
    fn crossing(&self, y: f64) -> Option<f64> {
        if (self.y0 > y) == (self.y1 > y) {
            return None;
        }
        let t = (y - self.y0) / (self.y1 - self.y0);
        Some(t.mul_add(self.x1 - self.x0, self.x0))
    }
}

/// One polygon of the geometry, converted to pixel space.
#[derive(Debug, Clone)]
struct Part {
    edges: Vec<Edge>,
    /// Smallest and largest row touched by any edge.
    min_y: f64,
    max_y: f64,
}

impl Part {
    fn new(polygon: &Polygon<f64>, transform: &AffineTransform) -> Self {
        let mut edges = Vec::new();
        push_ring_edges(polygon.exterior(), transform, &mut edges);
        for interior in polygon.interiors() {
            push_ring_edges(interior, transform, &mut edges);
        }
        let (min_y, max_y) = edges.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, e| {
            (acc.0.min(e.y0).min(e.y1), acc.1.max(e.y0).max(e.y1))
        });
        Self {
            edges,
            min_y,
            max_y,
        }
    }
}

/// Convert a ring's segments to pixel space, dropping any segment with a
/// non-finite endpoint.
fn push_ring_edges(ring: &LineString<f64>, transform: &AffineTransform, edges: &mut Vec<Edge>) {
    for line in ring.lines() {
        let a = transform.geo_to_pixel(line.start);
        let b = transform.geo_to_pixel(line.end);
        if [a.col, a.row, b.col, b.row].iter().all(|v| v.is_finite()) {
            edges.push(Edge {
                x0: a.col,
                y0: a.row,
                x1: b.col,
                y1: b.row,
            });
        }
    }
}

/// Rasterizes one geometry against one raster grid.
///
/// Construction converts every ring to pixel space once; the mask can
/// then be produced whole or in row blocks.
#[derive(Debug, Clone)]
pub struct PolygonRasterizer {
    parts: Vec<Part>,
    dimensions: Dimensions,
}

impl PolygonRasterizer {
    /// Prepare `geometry` for rasterization into the grid of `transform`.
    #[must_use]
    pub fn new(geometry: &MultiPolygon<f64>, transform: &AffineTransform) -> Self {
        Self {
            parts: geometry
                .iter()
                .map(|polygon| Part::new(polygon, transform))
                .filter(|part| !part.edges.is_empty())
                .collect(),
            dimensions: transform.dimensions(),
        }
    }

    /// Dimensions of the full output mask.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Rasterize the whole grid.
    #[must_use = "returns the polygon membership mask"]
    pub fn rasterize(&self) -> BinaryMask {
        self.rasterize_rows(0..self.dimensions.height)
    }

    /// Rasterize a block of rows.
    ///
    /// The returned mask is `width` × (number of rows in the block), with
    /// its row 0 corresponding to `rows.start`. The range is clipped to
    /// the grid height. Concatenating consecutive blocks reproduces
    /// [`rasterize`](Self::rasterize) exactly.
    #[must_use = "returns the polygon membership mask for the row block"]
    pub fn rasterize_rows(&self, rows: Range<u32>) -> BinaryMask {
        let end = rows.end.min(self.dimensions.height);
        let start = rows.start.min(end);
        let width = self.dimensions.width;
        let mut mask = BinaryMask::filled(Dimensions::new(width, end - start), false);
        if width == 0 {
            return mask;
        }

        let mut crossings = Vec::new();
        for (row, out) in (start..end).zip(mask.cells_mut().chunks_exact_mut(width as usize)) {
            let y = f64::from(row) + 0.5;
            for part in &self.parts {
                if y < part.min_y || y > part.max_y {
                    continue;
                }
                fill_scanline(&part.edges, y, width, &mut crossings, out);
            }
        }
        mask
    }
}

/// Fill the pixels of one row whose centres are inside `edges` at height `y`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fill_scanline(edges: &[Edge], y: f64, width: u32, crossings: &mut Vec<f64>, out: &mut [bool]) {
    crossings.clear();
    crossings.extend(edges.iter().filter_map(|e| e.crossing(y)));
    crossings.sort_unstable_by(f64::total_cmp);

    // Pixel `c` has its centre at `c + 0.5`; it is inside the span
    // `[enter, exit)` for `c` in `ceil(enter - 0.5)..ceil(exit - 0.5)`.
    for span in crossings.chunks_exact(2) {
        let first = (span[0] - 0.5).ceil().max(0.0);
        let last = (span[1] - 0.5).ceil().min(f64::from(width));
        if first < last {
            for cell in &mut out[first as usize..last as usize] {
                *cell = true;
            }
        }
    }
}

/// Rasterize a field polygon into the grid described by `transform`.
///
/// Fields entirely outside the raster bounds, and degenerate fields
/// with zero area, produce an all-false mask.
#[must_use = "returns the polygon membership mask"]
pub fn rasterize(field: &FieldPolygon, transform: &AffineTransform) -> BinaryMask {
    PolygonRasterizer::new(field.geometry(), transform).rasterize()
}
