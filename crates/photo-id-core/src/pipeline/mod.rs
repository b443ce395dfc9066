//! Pipeline stages and orchestration.
//!
//! The orchestrator sequences detection, matting, alignment, and
//! compositing, with detection and matting dispatched in parallel (they
//! have no data dependency). Every stage fails fast; the first failure
//! aborts the run with its error kind untouched.

mod align;
mod composite;
mod layout;

pub use align::{align_and_crop, AlignedSubject};
pub use composite::{composite, composite_rgba};
pub use layout::{pack, pack_sheet, PHOTO_GUTTER, SHEET_MARGIN};

use std::sync::Arc;
use std::thread::ScopedJoinHandle;

use image::RgbImage;
use tracing::debug;

use crate::domain::{
    AlignmentRatios, ColorSpec, FaceDetection, IdPhotoResult, LayoutSheet, PhotoSizeSpec,
    PipelineError, SheetSpec,
};
use crate::inference::{InferenceSession, ModelPaths};
use crate::ports::{FaceDetector, PortraitMatter};

/// Default confidence floor for face detection.
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.8;

/// Default long-edge cap for the preview matte.
pub const DEFAULT_PREVIEW_EDGE: u32 = 512;

/// Pipeline progression. `Detecting` and `Matting` run jointly; every
/// other transition is strictly sequential. A failure in any stage is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing started yet.
    Idle,
    /// Face detection in flight.
    Detecting,
    /// Portrait matting in flight.
    Matting,
    /// Alignment and crop.
    Aligning,
    /// Background compositing.
    Compositing,
    /// Optional print-sheet packing.
    Packing,
    /// Finished successfully.
    Done,
}

/// Full configuration for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target photo size.
    pub size: PhotoSizeSpec,
    /// Head geometry constraints.
    pub ratios: AlignmentRatios,
    /// Background color.
    pub color: ColorSpec,
    /// Whether to render the high-definition variant; when off, the
    /// standard rendering is duplicated into the hd slot.
    pub hd: bool,
    /// Whether to rotate the subject upright from the eye line.
    pub face_alignment: bool,
    /// Minimum detection confidence.
    pub confidence_floor: f32,
    /// Long-edge cap for the preview matte.
    pub matting_preview_edge: u32,
    /// Weight file locations, used when no session is supplied.
    pub models: ModelPaths,
}

impl PipelineConfig {
    /// Creates a configuration for the given target size with default
    /// ratios, white background, and both variants enabled.
    #[must_use]
    pub fn new(size: PhotoSizeSpec) -> Self {
        Self {
            size,
            ratios: AlignmentRatios::default(),
            color: ColorSpec::new(255, 255, 255),
            hd: true,
            face_alignment: true,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            matting_preview_edge: DEFAULT_PREVIEW_EDGE,
            models: ModelPaths::default(),
        }
    }

    /// Sets the background color.
    #[must_use]
    pub fn with_color(mut self, color: ColorSpec) -> Self {
        self.color = color;
        self
    }

    /// Sets the alignment ratios.
    #[must_use]
    pub fn with_ratios(mut self, ratios: AlignmentRatios) -> Self {
        self.ratios = ratios;
        self
    }

    /// Toggles the high-definition render.
    #[must_use]
    pub fn with_hd(mut self, hd: bool) -> Self {
        self.hd = hd;
        self
    }

    /// Toggles eye-line rotation.
    #[must_use]
    pub fn with_face_alignment(mut self, face_alignment: bool) -> Self {
        self.face_alignment = face_alignment;
        self
    }

    /// Sets the weight file locations.
    #[must_use]
    pub fn with_models(mut self, models: ModelPaths) -> Self {
        self.models = models;
        self
    }

    /// Validates the whole configuration before any inference work.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` describing the first violation.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.size.validate()?;
        self.ratios.validate()?;
        if !self.color.in_range() {
            return Err(PipelineError::InvalidConfiguration(
                "background color channel out of range".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "confidence_floor must lie in [0, 1], got {}",
                self.confidence_floor
            )));
        }
        if self.matting_preview_edge == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "matting_preview_edge must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// The pipeline orchestrator, generic over the two inference ports.
pub struct IdPhotoCreator<'a> {
    detector: &'a dyn FaceDetector,
    matter: &'a dyn PortraitMatter,
}

impl<'a> IdPhotoCreator<'a> {
    /// Creates an orchestrator over the given ports.
    #[must_use]
    pub fn new(detector: &'a dyn FaceDetector, matter: &'a dyn PortraitMatter) -> Self {
        Self { detector, matter }
    }

    /// Runs the full pipeline: detect, matte, align, composite.
    ///
    /// # Errors
    ///
    /// Returns the failing stage's error kind unchanged: see
    /// [`PipelineError`] for the full set.
    pub fn create(
        &self,
        image: &RgbImage,
        config: &PipelineConfig,
    ) -> Result<IdPhotoResult, PipelineError> {
        config.validate()?;
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "input image is empty".into(),
            ));
        }

        // Detection and matting have no mutual data dependency; run both
        // and join before aligning. A failure in either discards the
        // other's result.
        debug!("{:?} -> {:?} + {:?}", Stage::Idle, Stage::Detecting, Stage::Matting);
        let (detections, mattes) = std::thread::scope(|scope| {
            let detect = scope.spawn(|| self.detector.detect(image, config.confidence_floor));
            let matte = scope.spawn(|| self.matter.matte(image, config.matting_preview_edge));
            (join_stage(detect), join_stage(matte))
        });
        let detections = detections.map_err(|e| fail(Stage::Detecting, e))?;
        let mattes = mattes.map_err(|e| fail(Stage::Matting, e))?;

        let face = match detections.len() {
            0 => return Err(fail(Stage::Detecting, PipelineError::NoFaceDetected)),
            1 => detections[0],
            n => {
                return Err(fail(
                    Stage::Detecting,
                    PipelineError::AmbiguousFaceCount(n),
                ))
            }
        };

        debug!("-> {:?}", Stage::Aligning);
        let aligned = align_and_crop(
            image,
            &face,
            &mattes,
            config.size,
            config.ratios,
            config.face_alignment,
        )
        .map_err(|e| fail(Stage::Aligning, e))?;

        debug!("-> {:?}", Stage::Compositing);
        let standard_subject = image::imageops::resize(
            &aligned.crop,
            config.size.width,
            config.size.height,
            image::imageops::FilterType::Lanczos3,
        );
        let standard = composite(&standard_subject, &aligned.matte_preview, config.color)
            .map_err(|e| fail(Stage::Compositing, e))?;

        let hd = if config.hd {
            // Composite at native crop resolution, then supersample down
            // to the same target dimensions.
            let native = composite(&aligned.crop, &aligned.matte, config.color)
                .map_err(|e| fail(Stage::Compositing, e))?;
            image::imageops::resize(
                &native,
                config.size.width,
                config.size.height,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            standard.clone()
        };

        debug!("-> {:?}", Stage::Done);
        Ok(IdPhotoResult {
            standard,
            hd,
            dpi: config.size.dpi,
        })
    }

    /// Runs the full pipeline and packs the standard rendering onto a
    /// print sheet.
    ///
    /// # Errors
    ///
    /// Any [`Self::create`] failure, or the packer's error kinds.
    pub fn create_with_layout(
        &self,
        image: &RgbImage,
        config: &PipelineConfig,
        sheet: SheetSpec,
    ) -> Result<(IdPhotoResult, LayoutSheet), PipelineError> {
        let result = self.create(image, config)?;
        debug!("-> {:?}", Stage::Packing);
        let layout = pack_sheet(&result.standard, sheet, config.size.dpi)
            .map_err(|e| fail(Stage::Packing, e))?;
        Ok((result, layout))
    }
}

/// Logs the failing stage and passes the error through untouched.
fn fail(stage: Stage, err: PipelineError) -> PipelineError {
    debug!("Pipeline failed during {stage:?}: {err}");
    err
}

/// Joins a stage thread, turning a panic into an inference error rather
/// than propagating it.
fn join_stage<T>(
    handle: ScopedJoinHandle<'_, Result<T, PipelineError>>,
) -> Result<T, PipelineError> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Inference(anyhow::anyhow!(
            "inference stage panicked"
        ))),
    }
}

/// Runs the full pipeline against a candle inference session, creating
/// the session from `config.models` when none is supplied and returning
/// it for reuse.
///
/// # Errors
///
/// Configuration errors surface before any session or weight work; stage
/// errors pass through unchanged.
pub fn run_pipeline(
    image: &RgbImage,
    config: &PipelineConfig,
    session: Option<Arc<InferenceSession>>,
) -> Result<(IdPhotoResult, Arc<InferenceSession>), PipelineError> {
    config.validate()?;
    let session = session.unwrap_or_else(|| InferenceSession::shared(&config.models));
    let creator = IdPhotoCreator::new(session.as_ref(), session.as_ref());
    let result = creator.create(image, config)?;
    Ok((result, session))
}

/// Standalone face detection for callers that do not need the full
/// pipeline. Creates the session from `paths` when none is supplied and
/// returns it for reuse.
///
/// # Errors
///
/// Returns `NoFaceDetected` when nothing clears the confidence floor;
/// an ambiguous count is not an error here, the caller decides.
pub fn detect_faces(
    image: &RgbImage,
    paths: &ModelPaths,
    session: Option<Arc<InferenceSession>>,
    confidence_floor: f32,
) -> Result<(Vec<FaceDetection>, Arc<InferenceSession>), PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidConfiguration(
            "input image is empty".into(),
        ));
    }
    let session = session.unwrap_or_else(|| InferenceSession::shared(paths));
    let detections = session.detect(image, confidence_floor)?;
    if detections.is_empty() {
        return Err(PipelineError::NoFaceDetected);
    }
    Ok((detections, session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlphaMatte, BoundingBox, FaceLandmarks, MattePair, Point};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub detector returning a fixed detection list or an error.
    struct StubDetector {
        detections: Vec<FaceDetection>,
        calls: AtomicUsize,
    }

    impl StubDetector {
        fn with(detections: Vec<FaceDetection>) -> Self {
            Self {
                detections,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FaceDetector for StubDetector {
        fn detect(
            &self,
            _image: &RgbImage,
            _confidence_floor: f32,
        ) -> Result<Vec<FaceDetection>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detections.clone())
        }
    }

    /// Stub matter returning a fully opaque matte pair.
    struct StubMatter;

    impl PortraitMatter for StubMatter {
        fn matte(
            &self,
            image: &RgbImage,
            preview_edge: u32,
        ) -> Result<MattePair, PipelineError> {
            let hd = AlphaMatte::from_fn(image.width(), image.height(), |_, _| 1.0);
            let scale = preview_edge.min(image.width().max(image.height()));
            let pw = image.width() * scale / image.width().max(image.height());
            let ph = image.height() * scale / image.width().max(image.height());
            let standard = AlphaMatte::from_fn(pw.max(1), ph.max(1), |_, _| 1.0);
            Ok(MattePair { standard, hd })
        }
    }

    fn centered_face() -> FaceDetection {
        FaceDetection {
            bbox: BoundingBox::new(400.0, 300.0, 600.0, 500.0),
            confidence: 0.97,
            landmarks: FaceLandmarks {
                left_eye: Point::new(460.0, 370.0),
                right_eye: Point::new(540.0, 370.0),
                nose: Point::new(500.0, 400.0),
                left_mouth: Point::new(470.0, 450.0),
                right_mouth: Point::new(530.0, 450.0),
            },
        }
    }

    fn workable_config() -> PipelineConfig {
        PipelineConfig::new(PhotoSizeSpec::new(295, 413, 300)).with_ratios(AlignmentRatios {
            head_measure_ratio: 0.5,
            head_height_ratio: 0.3,
            top_distance_min: 0.2,
            top_distance_max: 0.3,
        })
    }

    #[test]
    fn test_config_default_values() {
        let config = PipelineConfig::new(PhotoSizeSpec::new(295, 413, 300));
        assert!(config.hd);
        assert!(config.face_alignment);
        assert!((config.confidence_floor - DEFAULT_CONFIDENCE_FLOOR).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_hex_color() {
        let result = ColorSpec::from_hex("ZZZZZZ");
        assert!(matches!(
            result,
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_config_rejects_inverted_band() {
        let config = workable_config().with_ratios(AlignmentRatios {
            top_distance_min: 0.3,
            top_distance_max: 0.2,
            ..AlignmentRatios::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_bad_floor() {
        let mut config = workable_config();
        config.confidence_floor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_produces_target_dimensions() {
        let detector = StubDetector::with(vec![centered_face()]);
        let creator = IdPhotoCreator::new(&detector, &StubMatter);
        let image = RgbImage::from_pixel(1000, 1000, image::Rgb([90, 90, 90]));

        let result = creator.create(&image, &workable_config()).unwrap();
        assert_eq!(result.standard.dimensions(), (295, 413));
        assert_eq!(result.hd.dimensions(), (295, 413));
        assert_eq!(result.dpi, 300);
    }

    #[test]
    fn test_create_no_face() {
        let detector = StubDetector::with(vec![]);
        let creator = IdPhotoCreator::new(&detector, &StubMatter);
        let image = RgbImage::new(640, 480);

        let err = creator.create(&image, &workable_config()).unwrap_err();
        assert!(matches!(err, PipelineError::NoFaceDetected));
    }

    #[test]
    fn test_create_ambiguous_faces() {
        let detector = StubDetector::with(vec![centered_face(), centered_face()]);
        let creator = IdPhotoCreator::new(&detector, &StubMatter);
        let image = RgbImage::new(1000, 1000);

        let err = creator.create(&image, &workable_config()).unwrap_err();
        assert!(matches!(err, PipelineError::AmbiguousFaceCount(2)));
    }

    #[test]
    fn test_invalid_config_rejected_before_inference() {
        let detector = StubDetector::with(vec![centered_face()]);
        let creator = IdPhotoCreator::new(&detector, &StubMatter);
        let image = RgbImage::new(1000, 1000);

        let mut config = workable_config();
        config.size = PhotoSizeSpec::new(0, 413, 300);
        let err = creator.create(&image, &config).unwrap_err();

        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
        assert_eq!(detector.calls(), 0);
    }

    #[test]
    fn test_empty_image_rejected() {
        let detector = StubDetector::with(vec![centered_face()]);
        let creator = IdPhotoCreator::new(&detector, &StubMatter);
        let image = RgbImage::new(0, 0);

        let err = creator.create(&image, &workable_config()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
        assert_eq!(detector.calls(), 0);
    }

    #[test]
    fn test_hd_disabled_duplicates_standard() {
        let detector = StubDetector::with(vec![centered_face()]);
        let creator = IdPhotoCreator::new(&detector, &StubMatter);
        let image = RgbImage::from_pixel(1000, 1000, image::Rgb([12, 34, 56]));

        let config = workable_config().with_hd(false);
        let result = creator.create(&image, &config).unwrap();
        assert_eq!(result.standard.as_raw(), result.hd.as_raw());
    }

    #[test]
    fn test_create_with_layout_packs_standard() {
        let detector = StubDetector::with(vec![centered_face()]);
        let creator = IdPhotoCreator::new(&detector, &StubMatter);
        let image = RgbImage::from_pixel(1000, 1000, image::Rgb([90, 90, 90]));

        let (result, layout) = creator
            .create_with_layout(&image, &workable_config(), SheetSpec::new(1800, 1200))
            .unwrap();
        assert_eq!(result.standard.dimensions(), (295, 413));
        assert_eq!(layout.count(), 10);
    }
}
