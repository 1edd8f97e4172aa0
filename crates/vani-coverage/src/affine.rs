//! Pixel ↔ geographic mapping for a north-up raster.
//!
//! Column `0..=width` maps linearly onto longitude `west..=east` and row
//! `0..=height` maps onto latitude `north..=south`: row 0 is the northern
//! edge and rows grow southward, as in image space. Integer pixel
//! coordinates name a pixel's top-left corner; its centre is at
//! `(row + 0.5, col + 0.5)`.

use geo::Coord;

use crate::types::{CoverageError, Dimensions, GeoBounds};

/// A fractional position in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    /// Row, increasing southward from the northern edge.
    pub row: f64,
    /// Column, increasing eastward from the western edge.
    pub col: f64,
}

/// Linear mapping between a raster's pixel grid and its geographic bounds.
///
/// Built once per (bounds, width, height) triple and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    bounds: GeoBounds,
    dimensions: Dimensions,
    /// Degrees of longitude per column.
    pixel_width: f64,
    /// Degrees of latitude per row (positive; rows run southward).
    pixel_height: f64,
}

impl AffineTransform {
    /// Derive the transform for a `width` × `height` raster covering `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidBounds`] if `width` or `height` is zero.
    /// The bounds themselves are already validated by [`GeoBounds`].
    pub fn from_bounds(bounds: GeoBounds, width: u32, height: u32) -> Result<Self, CoverageError> {
        if width == 0 || height == 0 {
            return Err(CoverageError::InvalidBounds(format!(
                "raster dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            bounds,
            dimensions: Dimensions::new(width, height),
            pixel_width: bounds.width() / f64::from(width),
            pixel_height: bounds.height() / f64::from(height),
        })
    }

    /// The geographic extent of the raster.
    #[must_use]
    pub const fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// The raster dimensions this transform was built for.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Size of one pixel as `(degrees longitude, degrees latitude)`.
    #[must_use]
    pub const fn pixel_size(&self) -> (f64, f64) {
        (self.pixel_width, self.pixel_height)
    }

    /// Map a pixel-space position to geographic coordinates
    /// (`x` = longitude, `y` = latitude).
    #[must_use]
    pub fn pixel_to_geo(&self, pixel: PixelPoint) -> Coord<f64> {
        Coord {
            x: pixel.col.mul_add(self.pixel_width, self.bounds.west()),
            y: pixel.row.mul_add(-self.pixel_height, self.bounds.north()),
        }
    }

    /// Map geographic coordinates to a fractional pixel-space position.
    ///
    /// Points outside the bounds map outside `0..width` / `0..height`;
    /// nothing is clamped.
    #[must_use]
    pub fn geo_to_pixel(&self, coord: Coord<f64>) -> PixelPoint {
        PixelPoint {
            row: (self.bounds.north() - coord.y) / self.pixel_height,
            col: (coord.x - self.bounds.west()) / self.pixel_width,
        }
    }

    /// Geographic coordinates of the centre of pixel (`row`, `col`).
    #[must_use]
    pub fn pixel_center(&self, row: u32, col: u32) -> Coord<f64> {
        self.pixel_to_geo(PixelPoint {
            row: f64::from(row) + 0.5,
            col: f64::from(col) + 0.5,
        })
    }
}
