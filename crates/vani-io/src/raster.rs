//! Raster decoding: probability grids and SAR images from files.
//!
//! Probability grids come from either
//! - a JSON document: nested rows (`[[0.1, 0.9], ...]`, with `null` read
//!   as `NaN`) or the `{"dimensions": ..., "values": ...}` object form, or
//! - a grayscale PNG: 8-bit samples are divided by 255 and 16-bit
//!   samples by 65535. Colour images are reduced to luminance first.
//!
//! SAR images are read from a VV and a VH grayscale PNG with
//! [`read_sar_image`]. Nothing in this workspace turns them into
//! probabilities: they are for callers that bring their own
//! [`SegmentationModel`](vani_coverage::SegmentationModel) and pass it to
//! [`assess_image`](vani_coverage::assess_image) or
//! [`assess_field`](vani_coverage::assess_field). [`FsTileSource`] tiles
//! and the CLI only handle probability rasters.
//!
//! [`FsTileSource`]: crate::FsTileSource

use std::path::Path;

use image::{ColorType, DynamicImage};
use serde::Deserialize;
use vani_coverage::{CoverageError, Dimensions, ProbabilityGrid, SarImage};

use crate::error::IoError;

/// Raster file formats the decoders understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// JSON probability grid.
    Json,
    /// Grayscale PNG.
    Png,
}

impl RasterFormat {
    /// Infer the format from a file extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GridDocument {
    Rows(Vec<Vec<Option<f64>>>),
    Grid(ProbabilityGrid),
}

/// Read a probability grid from a `.json` or `.png` file.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedFormat`] for other extensions, and
/// read, parse, or decode errors for malformed files. Grids with zero
/// area or ragged rows yield [`IoError::Coverage`].
pub fn read_probability_grid(path: &Path) -> Result<ProbabilityGrid, IoError> {
    let grid = match RasterFormat::from_path(path) {
        Some(RasterFormat::Json) => {
            let json = std::fs::read_to_string(path).map_err(|source| IoError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            grid_from_json(&json, &path.display().to_string())?
        }
        Some(RasterFormat::Png) => probability_grid_from_image(&open_image(path)?)?,
        None => return Err(IoError::UnsupportedFormat(path.to_path_buf())),
    };
    tracing::debug!(path = %path.display(), dimensions = %grid.dimensions(), "decoded probability grid");
    Ok(grid)
}

/// Parse a probability grid from JSON text.
///
/// # Errors
///
/// Returns [`IoError::Json`] if the text is neither nested rows nor a
/// grid object, or [`IoError::Coverage`] if the rows are empty or ragged.
pub fn probability_grid_from_json(json: &str) -> Result<ProbabilityGrid, IoError> {
    grid_from_json(json, "<string>")
}

fn grid_from_json(json: &str, origin: &str) -> Result<ProbabilityGrid, IoError> {
    let document: GridDocument = serde_json::from_str(json).map_err(|source| IoError::Json {
        origin: origin.to_owned(),
        source,
    })?;
    match document {
        GridDocument::Rows(rows) => {
            let rows: Vec<Vec<f64>> = rows
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                .collect();
            Ok(ProbabilityGrid::from_rows(&rows)?)
        }
        GridDocument::Grid(grid) => Ok(grid),
    }
}

/// Convert a decoded image to probabilities in `[0, 1]`.
///
/// # Errors
///
/// Returns [`IoError::Coverage`] if the image has zero area.
pub fn probability_grid_from_image(image: &DynamicImage) -> Result<ProbabilityGrid, IoError> {
    let dimensions = Dimensions::new(image.width(), image.height());
    Ok(ProbabilityGrid::new(dimensions, unit_luminance(image))?)
}

/// Read a SAR image from separate VV and VH grayscale images.
///
/// # Errors
///
/// Returns [`IoError::Coverage`] wrapping
/// [`CoverageError::ShapeMismatch`] if the two images differ in size.
/// Decode errors are propagated.
pub fn read_sar_image(vv: &Path, vh: &Path) -> Result<SarImage, IoError> {
    sar_image_from_images(&open_image(vv)?, &open_image(vh)?)
}

/// Combine decoded VV and VH images into a [`SarImage`], scaling 8-bit
/// samples into `[0, 1]`.
///
/// # Errors
///
/// Same as [`read_sar_image`], minus decode errors.
pub fn sar_image_from_images(vv: &DynamicImage, vh: &DynamicImage) -> Result<SarImage, IoError> {
    let expected = Dimensions::new(vv.width(), vv.height());
    let actual = Dimensions::new(vh.width(), vh.height());
    if expected != actual {
        return Err(CoverageError::ShapeMismatch { expected, actual }.into());
    }
    let channel = |image: &DynamicImage| -> Vec<f32> {
        image
            .to_luma8()
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect()
    };
    Ok(SarImage::new(expected, channel(vv), channel(vh))?)
}

fn open_image(path: &Path) -> Result<DynamicImage, IoError> {
    image::open(path).map_err(|source| IoError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Luminance of every pixel scaled by the sample range of its bit depth.
fn unit_luminance(image: &DynamicImage) -> Vec<f64> {
    match image.color() {
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => image
            .to_luma16()
            .into_raw()
            .into_iter()
            .map(|v| f64::from(v) / f64::from(u16::MAX))
            .collect(),
        _ => image
            .to_luma8()
            .into_raw()
            .into_iter()
            .map(|v| f64::from(v) / f64::from(u8::MAX))
            .collect(),
    }
}
