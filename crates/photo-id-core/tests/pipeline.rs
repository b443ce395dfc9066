//! Pipeline integration tests driving the orchestrator through mock
//! inference ports with synthetic portraits.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use image::Rgb;
use photo_id_core::domain::{
    AlignmentRatios, BoundingBox, ColorSpec, PhotoSizeSpec, PipelineError, SheetSpec,
};
use photo_id_core::pipeline::{align_and_crop, pack_sheet, IdPhotoCreator, PipelineConfig};
use photo_id_core::ports::PortraitMatter;
use photo_id_test_support::{MockFaceDetector, MockPortraitMatter, SyntheticPortrait, SyntheticPortraitBuilder};

/// A portrait sized so the one-inch spec ratios produce an in-bounds
/// crop: 200px face in a 1000x1200 frame with ample room below.
fn roomy_portrait() -> SyntheticPortrait {
    SyntheticPortraitBuilder::with_face_box(1000, 1200, BoundingBox::new(400.0, 150.0, 560.0, 350.0))
}

fn one_inch_config() -> PipelineConfig {
    PipelineConfig::new(PhotoSizeSpec::new(295, 413, 300)).with_ratios(AlignmentRatios {
        head_measure_ratio: 0.2,
        head_height_ratio: 0.45,
        top_distance_min: 0.10,
        top_distance_max: 0.12,
    })
}

/// Matter opaque over the face and its surroundings, transparent
/// elsewhere, so composited output has real background to assert on.
fn face_matter(portrait: &SyntheticPortrait) -> MockPortraitMatter {
    let bbox = portrait.detection.bbox;
    MockPortraitMatter::opaque_rect(BoundingBox::new(
        bbox.x1 - 40.0,
        bbox.y1 - 40.0,
        bbox.x2 + 40.0,
        bbox.y2 + 40.0,
    ))
}

// === Happy path ===

#[test]
fn test_one_inch_scenario_dimensions_and_background() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = face_matter(&portrait);
    let creator = IdPhotoCreator::new(&detector, &matter);

    let result = creator.create(&portrait.image, &one_inch_config()).unwrap();

    assert_eq!(result.standard.dimensions(), (295, 413));
    assert_eq!(result.hd.dimensions(), (295, 413));
    assert_eq!(result.dpi, 300);

    // Corners sit outside the subject region: pure background color.
    assert_eq!(result.standard.get_pixel(0, 0), &Rgb([255, 255, 255]));
    assert_eq!(result.standard.get_pixel(294, 0), &Rgb([255, 255, 255]));
    assert_eq!(result.hd.get_pixel(0, 0), &Rgb([255, 255, 255]));

    // The face interior survives compositing.
    let face = result.standard.get_pixel(147, 91);
    assert!(face[0] > 200 && face[1] > 140 && face[1] < 200);
}

#[test]
fn test_colored_background_fills_transparent_region() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = face_matter(&portrait);
    let creator = IdPhotoCreator::new(&detector, &matter);

    let config = one_inch_config().with_color(ColorSpec::new(86, 140, 212));
    let result = creator.create(&portrait.image, &config).unwrap();
    assert_eq!(result.standard.get_pixel(0, 0), &Rgb([86, 140, 212]));
}

#[test]
fn test_pipeline_is_deterministic() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = face_matter(&portrait);
    let creator = IdPhotoCreator::new(&detector, &matter);
    let config = one_inch_config();

    let first = creator.create(&portrait.image, &config).unwrap();
    let second = creator.create(&portrait.image, &config).unwrap();

    assert_eq!(first.standard.as_raw(), second.standard.as_raw());
    assert_eq!(first.hd.as_raw(), second.hd.as_raw());
}

#[test]
fn test_hd_toggle_off_duplicates_standard() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = face_matter(&portrait);
    let creator = IdPhotoCreator::new(&detector, &matter);

    let config = one_inch_config().with_hd(false);
    let result = creator.create(&portrait.image, &config).unwrap();
    assert_eq!(result.standard.as_raw(), result.hd.as_raw());
}

// === Face count handling ===

#[test]
fn test_zero_faces_is_no_face_detected() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::empty();
    let matter = MockPortraitMatter::opaque();
    let creator = IdPhotoCreator::new(&detector, &matter);

    let err = creator.create(&portrait.image, &one_inch_config()).unwrap_err();
    assert!(matches!(err, PipelineError::NoFaceDetected));
}

#[test]
fn test_below_floor_face_is_no_face_detected() {
    let portrait = roomy_portrait();
    let mut weak = portrait.detection;
    weak.confidence = 0.4;
    let detector = MockFaceDetector::with_detections(vec![weak]);
    let matter = MockPortraitMatter::opaque();
    let creator = IdPhotoCreator::new(&detector, &matter);

    let err = creator.create(&portrait.image, &one_inch_config()).unwrap_err();
    assert!(matches!(err, PipelineError::NoFaceDetected));
}

#[test]
fn test_two_faces_is_ambiguous() {
    let portrait = roomy_portrait();
    let mut second = portrait.detection;
    second.confidence = 0.91;
    let detector = MockFaceDetector::with_detections(vec![portrait.detection, second]);
    let matter = MockPortraitMatter::opaque();
    let creator = IdPhotoCreator::new(&detector, &matter);

    let err = creator.create(&portrait.image, &one_inch_config()).unwrap_err();
    assert!(matches!(err, PipelineError::AmbiguousFaceCount(2)));
}

// === Stage failure propagation ===

#[test]
fn test_matting_failure_passes_through_unchanged() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = MockPortraitMatter::failing("matte rejected");
    let creator = IdPhotoCreator::new(&detector, &matter);

    let err = creator.create(&portrait.image, &one_inch_config()).unwrap_err();
    match err {
        PipelineError::MattingFailure(reason) => assert_eq!(reason, "matte rejected"),
        other => panic!("expected MattingFailure, got {other:?}"),
    }
}

#[test]
fn test_detector_failure_discards_matte() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::failing();
    let matter = MockPortraitMatter::opaque();
    let creator = IdPhotoCreator::new(&detector, &matter);

    let err = creator.create(&portrait.image, &one_inch_config()).unwrap_err();
    assert!(matches!(err, PipelineError::Inference(_)));
    // Matting ran (they are independent) but its result went unused.
    assert_eq!(matter.call_count(), 1);
}

#[test]
fn test_crop_out_of_bounds_for_edge_hugging_head() {
    let portrait = SyntheticPortraitBuilder::near_top_edge(800, 1000);
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = MockPortraitMatter::opaque();
    let creator = IdPhotoCreator::new(&detector, &matter);

    let err = creator.create(&portrait.image, &one_inch_config()).unwrap_err();
    assert!(matches!(err, PipelineError::CropOutOfBounds { .. }));
}

// === Configuration gating ===

#[test]
fn test_invalid_hex_color_fails_before_inference() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = MockPortraitMatter::opaque();
    let creator = IdPhotoCreator::new(&detector, &matter);

    // The wire color fails to parse; no config can even be built from it.
    let parse = ColorSpec::from_hex("ZZZZZZ");
    assert!(matches!(parse, Err(PipelineError::InvalidConfiguration(_))));

    // An out-of-range triple smuggled into the config is also rejected
    // before any stage runs.
    let mut config = one_inch_config();
    config.color = ColorSpec { r: 999, g: 0, b: 0 };
    let err = creator.create(&portrait.image, &config).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    assert_eq!(detector.call_count(), 0);
    assert_eq!(matter.call_count(), 0);
}

#[test]
fn test_inverted_band_fails_before_inference() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = MockPortraitMatter::opaque();
    let creator = IdPhotoCreator::new(&detector, &matter);

    let config = one_inch_config().with_ratios(AlignmentRatios {
        top_distance_min: 0.12,
        top_distance_max: 0.10,
        ..AlignmentRatios::default()
    });
    let err = creator.create(&portrait.image, &config).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    assert_eq!(detector.call_count(), 0);
}

// === Alignment invariant ===

#[test]
fn test_tilted_portrait_comes_out_level() {
    let portrait = roomy_portrait();
    // Tilt the eye line by 8 degrees.
    let mut detection = portrait.detection;
    let left = detection.landmarks.left_eye;
    let dx = detection.landmarks.right_eye.x - left.x;
    let angle = 8.0_f32.to_radians();
    detection.landmarks.right_eye = photo_id_core::domain::Point::new(
        left.x + dx * angle.cos(),
        left.y + dx * angle.sin(),
    );

    let matter = MockPortraitMatter::opaque();
    let mattes = matter.matte(&portrait.image, 512).unwrap();
    let config = one_inch_config();

    let aligned = align_and_crop(
        &portrait.image,
        &detection,
        &mattes,
        config.size,
        config.ratios,
        true,
    )
    .unwrap();

    assert!(aligned.detection.eye_line_angle().abs() < 1e-3);
    // Head-top band invariant holds in crop coordinates.
    let fraction = aligned.detection.bbox.y1 / aligned.crop.height() as f32;
    assert!(fraction >= config.ratios.top_distance_min - 0.01);
    assert!(fraction <= config.ratios.top_distance_max + 0.01);
}

// === Layout packing ===

#[test]
fn test_pack_sheet_scenario() {
    let portrait = roomy_portrait();
    let detector = MockFaceDetector::with_detections(vec![portrait.detection]);
    let matter = face_matter(&portrait);
    let creator = IdPhotoCreator::new(&detector, &matter);

    let result = creator.create(&portrait.image, &one_inch_config()).unwrap();
    let sheet = pack_sheet(&result.standard, SheetSpec::new(1800, 1200), 300).unwrap();

    assert_eq!(sheet.count(), 10);
    // Total photo area plus margins fits within the sheet area.
    let photo_area = u64::from(sheet.photo_width) * u64::from(sheet.photo_height);
    let sheet_area = u64::from(sheet.width) * u64::from(sheet.height);
    assert!(photo_area * sheet.count() as u64 <= sheet_area);

    // The rendered sheet has the right size and white margins.
    let raster = sheet.render(&result.standard);
    assert_eq!(raster.dimensions(), (1800, 1200));
    assert_eq!(raster.get_pixel(0, 0), &Rgb([255, 255, 255]));
}

#[test]
fn test_pack_sheet_photo_too_large() {
    let photo = image::RgbImage::new(1300, 900);
    let err = pack_sheet(&photo, SheetSpec::new(1200, 800), 300).unwrap_err();
    assert!(matches!(err, PipelineError::PhotoTooLargeForSheet { .. }));
}
