//! Typed pipeline errors.
//!
//! Every stage fails fast with one of these kinds and the orchestrator
//! surfaces it unchanged. Mapping to user-facing messages or status codes
//! is the calling service's job.

use thiserror::Error;

/// Error returned by any pipeline stage.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No face was detected above the confidence floor.
    #[error("no face detected above the confidence floor")]
    NoFaceDetected,

    /// More than one qualifying face where exactly one is required.
    #[error("expected exactly one face, found {0}")]
    AmbiguousFaceCount(usize),

    /// The matting engine could not produce a matte of the source's
    /// aspect ratio.
    #[error("portrait matting failed: {0}")]
    MattingFailure(String),

    /// The computed crop rectangle exceeds the source image extent.
    #[error(
        "crop rectangle at ({x}, {y}) sized {width}x{height} exceeds source {source_width}x{source_height}"
    )]
    CropOutOfBounds {
        /// Crop left edge (may be negative when the head sits near the frame edge).
        x: i64,
        /// Crop top edge.
        y: i64,
        /// Crop width in pixels.
        width: u32,
        /// Crop height in pixels.
        height: u32,
        /// Source image width.
        source_width: u32,
        /// Source image height.
        source_height: u32,
    },

    /// A background color channel is outside [0, 255].
    #[error("background color channel out of range")]
    InvalidColor,

    /// The matte cannot be aligned to the crop's aspect ratio.
    #[error(
        "matte {matte_width}x{matte_height} cannot be aligned to crop {crop_width}x{crop_height}"
    )]
    ResolutionMismatch {
        /// Matte width in pixels.
        matte_width: u32,
        /// Matte height in pixels.
        matte_height: u32,
        /// Crop width in pixels.
        crop_width: u32,
        /// Crop height in pixels.
        crop_height: u32,
    },

    /// Zero copies of the photo fit on the requested sheet.
    #[error(
        "photo {photo_width}x{photo_height} does not fit on sheet {sheet_width}x{sheet_height}"
    )]
    PhotoTooLargeForSheet {
        /// Photo width in pixels.
        photo_width: u32,
        /// Photo height in pixels.
        photo_height: u32,
        /// Sheet width in pixels.
        sheet_width: u32,
        /// Sheet height in pixels.
        sheet_height: u32,
    },

    /// Configuration rejected before any inference work.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Mechanical inference failure: unreadable weights, tensor shape
    /// mismatch, device error.
    #[error(transparent)]
    Inference(#[from] anyhow::Error),
}
