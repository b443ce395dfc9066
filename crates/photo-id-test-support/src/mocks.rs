//! Mock implementations of the inference port traits.

use std::sync::{Arc, Mutex, PoisonError};

use image::RgbImage;
use photo_id_core::domain::{
    AlphaMatte, BoundingBox, FaceDetection, MattePair, PipelineError,
};
use photo_id_core::ports::{FaceDetector, PortraitMatter};

/// Mock `FaceDetector` yielding pre-built detections and tracking calls
/// for assertions.
pub struct MockFaceDetector {
    detections: Vec<FaceDetection>,
    fail: bool,
    calls: Arc<Mutex<usize>>,
}

impl MockFaceDetector {
    /// Creates a mock returning the given detections (still subject to
    /// the confidence floor passed at call time).
    #[must_use]
    pub fn with_detections(detections: Vec<FaceDetection>) -> Self {
        Self {
            detections,
            fail: false,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates a mock that detects nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_detections(vec![])
    }

    /// Creates a mock whose every call fails mechanically.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            detections: vec![],
            fail: true,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of `detect` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FaceDetector for MockFaceDetector {
    fn detect(
        &self,
        _image: &RgbImage,
        confidence_floor: f32,
    ) -> Result<Vec<FaceDetection>, PipelineError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        if self.fail {
            return Err(PipelineError::Inference(anyhow::anyhow!(
                "mock detector failure"
            )));
        }
        let mut survivors: Vec<FaceDetection> = self
            .detections
            .iter()
            .copied()
            .filter(|d| d.confidence >= confidence_floor)
            .collect();
        survivors.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(survivors)
    }
}

/// Mock `PortraitMatter` producing deterministic mattes without a model.
///
/// By default the whole frame is opaque foreground; an opaque rectangle
/// can be configured instead so composited output has real background
/// regions to assert on.
pub struct MockPortraitMatter {
    /// Foreground region in source-image coordinates; `None` means the
    /// full frame.
    opaque_region: Option<BoundingBox>,
    fail: Option<String>,
    calls: Arc<Mutex<usize>>,
}

impl MockPortraitMatter {
    /// Creates a mock whose matte is fully opaque.
    #[must_use]
    pub fn opaque() -> Self {
        Self {
            opaque_region: None,
            fail: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates a mock whose matte is opaque inside `region` and fully
    /// transparent outside it.
    #[must_use]
    pub fn opaque_rect(region: BoundingBox) -> Self {
        Self {
            opaque_region: Some(region),
            fail: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates a mock that fails with `MattingFailure`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            opaque_region: None,
            fail: Some(reason.into()),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of `matte` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn matte_at(&self, width: u32, height: u32, scale_x: f32, scale_y: f32) -> AlphaMatte {
        match self.opaque_region {
            None => AlphaMatte::from_fn(width, height, |_, _| 1.0),
            Some(region) => AlphaMatte::from_fn(width, height, |x, y| {
                let sx = x as f32 / scale_x;
                let sy = y as f32 / scale_y;
                if sx >= region.x1 && sx <= region.x2 && sy >= region.y1 && sy <= region.y2 {
                    1.0
                } else {
                    0.0
                }
            }),
        }
    }
}

impl PortraitMatter for MockPortraitMatter {
    fn matte(&self, image: &RgbImage, preview_edge: u32) -> Result<MattePair, PipelineError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        if let Some(reason) = &self.fail {
            return Err(PipelineError::MattingFailure(reason.clone()));
        }

        let (width, height) = image.dimensions();
        let hd = self.matte_at(width, height, 1.0, 1.0);

        let long = width.max(height).max(1);
        let (pw, ph) = if long <= preview_edge {
            (width, height)
        } else {
            (
                (width * preview_edge / long).max(1),
                (height * preview_edge / long).max(1),
            )
        };
        let standard = self.matte_at(pw, ph, pw as f32 / width as f32, ph as f32 / height as f32);

        Ok(MattePair { standard, hd })
    }
}
