//! Reusable inference session.
//!
//! The session owns the lazily-loaded detection and matting models so
//! the model-load cost is paid once and amortized across pipeline
//! invocations. It is immutable after construction and all inference
//! entry points take `&self`, so a single session may be shared across
//! concurrent invocations behind an `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;

use super::get_device;
use super::loader::LazyModel;
use super::matting::MattingNet;
use super::retinaface::RetinaFace;
use crate::domain::{FaceDetection, MattePair, PipelineError};
use crate::ports::{FaceDetector, PortraitMatter};

/// Weight file locations for the two models.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Face detector safetensors file.
    pub detector_weights: PathBuf,
    /// Portrait matting safetensors file.
    pub matting_weights: PathBuf,
}

impl ModelPaths {
    /// Creates model paths from the two weight file locations.
    #[must_use]
    pub fn new(detector_weights: impl Into<PathBuf>, matting_weights: impl Into<PathBuf>) -> Self {
        Self {
            detector_weights: detector_weights.into(),
            matting_weights: matting_weights.into(),
        }
    }
}

impl Default for ModelPaths {
    /// Conventional weight locations relative to the working directory.
    fn default() -> Self {
        Self::new(
            "models/retinaface.safetensors",
            "models/matting.safetensors",
        )
    }
}

/// Long-lived handle over the loaded inference models.
pub struct InferenceSession {
    detector: LazyModel<RetinaFace>,
    matting: LazyModel<MattingNet>,
}

impl InferenceSession {
    /// Creates a session. No weights are read until a model is first
    /// used.
    #[must_use]
    pub fn new(paths: &ModelPaths) -> Self {
        let device = get_device();
        Self {
            detector: LazyModel::new(&paths.detector_weights, device.clone(), RetinaFace::new),
            matting: LazyModel::new(&paths.matting_weights, device, MattingNet::new),
        }
    }

    /// Creates a session behind an `Arc` for reuse across invocations.
    #[must_use]
    pub fn shared(paths: &ModelPaths) -> Arc<Self> {
        Arc::new(Self::new(paths))
    }

    /// Whether the detector weights have been loaded.
    #[must_use]
    pub fn is_detector_loaded(&self) -> bool {
        self.detector.is_loaded()
    }

    /// Whether the matting weights have been loaded.
    #[must_use]
    pub fn is_matting_loaded(&self) -> bool {
        self.matting.is_loaded()
    }
}

impl FaceDetector for InferenceSession {
    fn detect(
        &self,
        image: &RgbImage,
        confidence_floor: f32,
    ) -> Result<Vec<FaceDetection>, PipelineError> {
        let model = self.detector.get().map_err(PipelineError::Inference)?;
        model
            .detect(image, confidence_floor)
            .map_err(PipelineError::Inference)
    }
}

impl PortraitMatter for InferenceSession {
    fn matte(&self, image: &RgbImage, preview_edge: u32) -> Result<MattePair, PipelineError> {
        // Failing to load weights is a mechanical inference error;
        // failing to produce a source-registered matte is MattingFailure.
        let model = self.matting.get().map_err(PipelineError::Inference)?;
        model
            .matte_pair(image, preview_edge)
            .map_err(|e| PipelineError::MattingFailure(format!("{e:#}")))
    }
}
