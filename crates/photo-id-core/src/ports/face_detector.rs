//! Face detection port.

use image::RgbImage;

use crate::domain::{FaceDetection, PipelineError};

/// Port for detecting faces in a decoded raster image.
pub trait FaceDetector: Send + Sync {
    /// Detects faces in `image`.
    ///
    /// Candidates below `confidence_floor` are excluded; the survivors are
    /// ordered by descending confidence. An empty image is an error, an
    /// empty result list is not — the caller decides what zero or many
    /// faces mean.
    ///
    /// # Errors
    ///
    /// Returns `Inference` when the underlying model fails mechanically.
    fn detect(
        &self,
        image: &RgbImage,
        confidence_floor: f32,
    ) -> Result<Vec<FaceDetection>, PipelineError>;
}
