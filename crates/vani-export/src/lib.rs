//! vani-export: Pure presentation serializers (sans-IO)
//!
//! Turns assessments into bytes and text for callers to store or send:
//! flood masks as PNG, coverage summaries as JSON or plain text.

pub mod png;
pub mod report;

pub use png::mask_to_png;
pub use report::CoverageReport;

/// Errors that can occur while serializing results.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The mask has zero width or height.
    #[error("cannot encode an empty mask")]
    EmptyMask,

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(String),

    /// JSON serialization failed.
    #[error("JSON serialization failed: {0}")]
    Json(String),
}

impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        Self::PngEncode(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
