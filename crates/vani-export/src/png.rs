//! Flood mask PNG encoding.
//!
//! Masks are written as single-channel 8-bit PNGs: 255 for flooded
//! cells, 0 for dry ones, row 0 at the top. Map clients overlay the image
//! on the raster's bounds.

use image::ImageEncoder;
use vani_coverage::BinaryMask;

use crate::ExportError;

/// Sample value for a flooded cell.
pub const FLOODED: u8 = 255;

/// Sample value for a dry cell.
pub const DRY: u8 = 0;

/// Encode a flood mask as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::EmptyMask`] if the mask has zero area.
/// Returns [`ExportError::PngEncode`] if PNG encoding fails.
pub fn mask_to_png(mask: &BinaryMask) -> Result<Vec<u8>, ExportError> {
    let dimensions = mask.dimensions();
    if dimensions.is_empty() {
        return Err(ExportError::EmptyMask);
    }
    let samples: Vec<u8> = mask
        .cells()
        .iter()
        .map(|&flooded| if flooded { FLOODED } else { DRY })
        .collect();

    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        &samples,
        dimensions.width,
        dimensions.height,
        image::ExtendedColorType::L8,
    )?;
    Ok(png_bytes)
}
