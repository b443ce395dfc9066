//! Alignment and crop engine.
//!
//! Rotates the subject upright using the eye landmarks, then computes a
//! crop rectangle satisfying the head-size and head-position ratio
//! constraints. Rotation is applied about the image center, not the face
//! center, so the landmark transform and the raster transform share one
//! center of rotation and no translation error compounds.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::domain::{
    AlignmentRatios, AlphaMatte, BoundingBox, FaceDetection, FaceLandmarks, MattePair,
    PhotoSizeSpec, PipelineError, Point,
};

/// Sub-pixel slack tolerated before a crop edge counts as out of bounds.
const BOUNDS_EPSILON: f32 = 0.5;

/// The aligned subject: a native-resolution crop at the target aspect
/// ratio, its two co-registered matte crops, and the detection mapped
/// into crop coordinates.
#[derive(Debug, Clone)]
pub struct AlignedSubject {
    /// Subject crop at source resolution, target aspect ratio.
    pub crop: RgbImage,
    /// High-definition matte crop, co-registered with `crop`.
    pub matte: AlphaMatte,
    /// Preview-resolution matte crop, same aspect ratio.
    pub matte_preview: AlphaMatte,
    /// The detection with bbox and landmarks in crop coordinates.
    pub detection: FaceDetection,
}

/// Aligns the subject upright and crops it to the target geometry.
///
/// `mattes.hd` must be co-registered with `image`; `mattes.standard` may
/// be any preview resolution of the same aspect ratio. With
/// `face_alignment` disabled the rotation step is skipped and the crop
/// is computed on the unrotated geometry.
///
/// # Errors
///
/// Returns `CropOutOfBounds` when the required crop rectangle extends
/// outside the source frame.
pub fn align_and_crop(
    image: &RgbImage,
    detection: &FaceDetection,
    mattes: &MattePair,
    size: PhotoSizeSpec,
    ratios: AlignmentRatios,
    face_alignment: bool,
) -> Result<AlignedSubject, PipelineError> {
    let angle = if face_alignment {
        detection.eye_line_angle()
    } else {
        0.0
    };

    let (image, matte_hd, matte_std, detection) = if angle.abs() > f32::EPSILON {
        debug!("Rotating subject by {:.2} degrees", angle.to_degrees());
        let rotated = rotate_about_center(image, -angle, Interpolation::Bilinear, Rgb([0, 0, 0]));
        let matte_hd = rotate_matte(&mattes.hd, angle);
        let matte_std = rotate_matte(&mattes.standard, angle);
        let center = Point::new(image.width() as f32 / 2.0, image.height() as f32 / 2.0);
        let detection = rotate_detection(detection, center, angle);
        (rotated, matte_hd, matte_std, detection)
    } else {
        (
            image.clone(),
            mattes.hd.clone(),
            mattes.standard.clone(),
            *detection,
        )
    };

    let rect = crop_rectangle(
        image.width(),
        image.height(),
        &detection.bbox,
        size,
        ratios,
    )?;
    debug!(
        "Crop rectangle ({}, {}) {}x{}",
        rect.x, rect.y, rect.width, rect.height
    );

    let crop = image::imageops::crop_imm(&image, rect.x, rect.y, rect.width, rect.height)
        .to_image();
    let matte = crop_matte(&matte_hd, image.width(), image.height(), &rect);
    let matte_preview = crop_matte(&matte_std, image.width(), image.height(), &rect);

    let shift = |p: Point| Point::new(p.x - rect.x as f32, p.y - rect.y as f32);
    let detection = FaceDetection {
        bbox: BoundingBox::new(
            detection.bbox.x1 - rect.x as f32,
            detection.bbox.y1 - rect.y as f32,
            detection.bbox.x2 - rect.x as f32,
            detection.bbox.y2 - rect.y as f32,
        ),
        confidence: detection.confidence,
        landmarks: FaceLandmarks {
            left_eye: shift(detection.landmarks.left_eye),
            right_eye: shift(detection.landmarks.right_eye),
            nose: shift(detection.landmarks.nose),
            left_mouth: shift(detection.landmarks.left_mouth),
            right_mouth: shift(detection.landmarks.right_mouth),
        },
    };

    Ok(AlignedSubject {
        crop,
        matte,
        matte_preview,
        detection,
    })
}

/// Integer crop rectangle, fully inside the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Computes the crop rectangle from the rotated face geometry.
///
/// Crop height makes the face's vertical extent `head_measure_ratio` of
/// the frame; width follows the target aspect. The face center sits at
/// `head_height_ratio` of the frame naturally, then the top gap is
/// clamped into the `[top_distance_min, top_distance_max]` band. Any
/// edge outside the source frame is a hard failure, not a clamp.
pub(crate) fn crop_rectangle(
    source_width: u32,
    source_height: u32,
    bbox: &BoundingBox,
    size: PhotoSizeSpec,
    ratios: AlignmentRatios,
) -> Result<CropRect, PipelineError> {
    let face_height = bbox.height();
    let crop_height = face_height / ratios.head_measure_ratio;
    let crop_width = crop_height * size.aspect_ratio() as f32;

    // Natural placement, then clamp the top gap into the allowed band.
    let natural_top = bbox.center().y - ratios.head_height_ratio * crop_height;
    let gap = bbox.y1 - natural_top;
    let gap = gap.clamp(
        ratios.top_distance_min * crop_height,
        ratios.top_distance_max * crop_height,
    );
    let top = bbox.y1 - gap;
    let left = bbox.center().x - crop_width / 2.0;

    let out_of_bounds = left < -BOUNDS_EPSILON
        || top < -BOUNDS_EPSILON
        || left + crop_width > source_width as f32 + BOUNDS_EPSILON
        || top + crop_height > source_height as f32 + BOUNDS_EPSILON;
    if out_of_bounds {
        return Err(PipelineError::CropOutOfBounds {
            x: left.round() as i64,
            y: top.round() as i64,
            width: crop_width.round().max(0.0) as u32,
            height: crop_height.round().max(0.0) as u32,
            source_width,
            source_height,
        });
    }

    let x = (left.round().max(0.0) as u32).min(source_width.saturating_sub(1));
    let y = (top.round().max(0.0) as u32).min(source_height.saturating_sub(1));
    let width = (crop_width.round() as u32).clamp(1, source_width - x);
    let height = (crop_height.round() as u32).clamp(1, source_height - y);

    Ok(CropRect {
        x,
        y,
        width,
        height,
    })
}

/// Rotates a point about `center` by the transform that levels an eye
/// line of the given angle.
fn rotate_point(p: Point, center: Point, angle: f32) -> Point {
    let (sin, cos) = angle.sin_cos();
    let dx = p.x - center.x;
    let dy = p.y - center.y;
    Point::new(
        center.x + dx * cos + dy * sin,
        center.y - dx * sin + dy * cos,
    )
}

/// Applies the rotation to a detection: landmarks map directly, the
/// bounding box becomes the axis-aligned hull of its rotated corners.
fn rotate_detection(detection: &FaceDetection, center: Point, angle: f32) -> FaceDetection {
    let rotate = |p: Point| rotate_point(p, center, angle);

    let corners = [
        rotate(Point::new(detection.bbox.x1, detection.bbox.y1)),
        rotate(Point::new(detection.bbox.x2, detection.bbox.y1)),
        rotate(Point::new(detection.bbox.x1, detection.bbox.y2)),
        rotate(Point::new(detection.bbox.x2, detection.bbox.y2)),
    ];
    let bbox = BoundingBox::new(
        corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min),
        corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min),
        corners.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max),
        corners.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max),
    );

    FaceDetection {
        bbox,
        confidence: detection.confidence,
        landmarks: FaceLandmarks {
            left_eye: rotate(detection.landmarks.left_eye),
            right_eye: rotate(detection.landmarks.right_eye),
            nose: rotate(detection.landmarks.nose),
            left_mouth: rotate(detection.landmarks.left_mouth),
            right_mouth: rotate(detection.landmarks.right_mouth),
        },
    }
}

/// Rotates a matte about its own center by the same transform applied to
/// the raster, sampling bilinearly and treating out-of-frame source
/// pixels as background.
fn rotate_matte(matte: &AlphaMatte, angle: f32) -> AlphaMatte {
    let width = matte.width();
    let height = matte.height();
    let center = Point::new(width as f32 / 2.0, height as f32 / 2.0);
    // Destination pixels pull from the inverse rotation of the content
    // transform.
    let (sin, cos) = angle.sin_cos();

    AlphaMatte::from_fn(width, height, |x, y| {
        let dx = x as f32 - center.x;
        let dy = y as f32 - center.y;
        let sx = center.x + dx * cos - dy * sin;
        let sy = center.y + dx * sin + dy * cos;
        if sx < 0.0 || sy < 0.0 || sx > (width - 1) as f32 || sy > (height - 1) as f32 {
            0.0
        } else {
            matte.sample(sx, sy)
        }
    })
}

/// Crops a matte by the rectangle computed in source-image coordinates,
/// rescaling the rectangle when the matte is a preview resolution.
fn crop_matte(matte: &AlphaMatte, source_width: u32, source_height: u32, rect: &CropRect) -> AlphaMatte {
    if matte.width() == source_width && matte.height() == source_height {
        if let Some(cropped) = matte.cropped(rect.x, rect.y, rect.width, rect.height) {
            return cropped;
        }
    }

    let sx = matte.width() as f32 / source_width.max(1) as f32;
    let sy = matte.height() as f32 / source_height.max(1) as f32;
    let x = ((rect.x as f32 * sx).round() as u32).min(matte.width().saturating_sub(1));
    let y = ((rect.y as f32 * sy).round() as u32).min(matte.height().saturating_sub(1));
    let width = ((rect.width as f32 * sx).round() as u32)
        .clamp(1, matte.width() - x);
    let height = ((rect.height as f32 * sy).round() as u32)
        .clamp(1, matte.height() - y);

    // cropped() cannot fail after the clamps above; fall back to the
    // full matte if it somehow does.
    matte.cropped(x, y, width, height).unwrap_or_else(|| matte.clone())
}
