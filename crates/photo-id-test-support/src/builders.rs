//! Synthetic portrait builders for testing.

use image::{Rgb, RgbImage};
use photo_id_core::domain::{BoundingBox, FaceDetection, FaceLandmarks, Point};

/// Background gray of the synthetic scenes.
const BACKDROP: Rgb<u8> = Rgb([180, 180, 180]);

/// Skin tone of the synthetic head.
const SKIN: Rgb<u8> = Rgb([224, 172, 140]);

/// A synthetic portrait: the raster plus the detection a perfect
/// detector would return for it.
#[derive(Debug, Clone)]
pub struct SyntheticPortrait {
    /// The rendered scene.
    pub image: RgbImage,
    /// Ground-truth face detection.
    pub detection: FaceDetection,
}

/// Builder for synthetic portrait scenes with known face geometry.
pub struct SyntheticPortraitBuilder;

impl SyntheticPortraitBuilder {
    /// A frontal portrait: head centered horizontally, face height 20%
    /// of the frame, face center at 40% from the top. Eyes are level.
    #[must_use]
    pub fn frontal(width: u32, height: u32) -> SyntheticPortrait {
        let face_height = height as f32 * 0.2;
        let face_width = face_height * 0.8;
        let cx = width as f32 / 2.0;
        let cy = height as f32 * 0.4;
        Self::with_face_box(
            width,
            height,
            BoundingBox::new(
                cx - face_width / 2.0,
                cy - face_height / 2.0,
                cx + face_width / 2.0,
                cy + face_height / 2.0,
            ),
        )
    }

    /// A portrait whose head hugs the top edge, leaving no room for the
    /// required gap above it.
    #[must_use]
    pub fn near_top_edge(width: u32, height: u32) -> SyntheticPortrait {
        let face_height = height as f32 * 0.4;
        let face_width = face_height * 0.8;
        let cx = width as f32 / 2.0;
        Self::with_face_box(
            width,
            height,
            BoundingBox::new(
                cx - face_width / 2.0,
                4.0,
                cx + face_width / 2.0,
                4.0 + face_height,
            ),
        )
    }

    /// A frontal portrait with the eye line tilted by `degrees`.
    #[must_use]
    pub fn tilted(width: u32, height: u32, degrees: f32) -> SyntheticPortrait {
        let mut portrait = Self::frontal(width, height);
        let landmarks = &mut portrait.detection.landmarks;
        let left = landmarks.left_eye;
        let dx = landmarks.right_eye.x - left.x;
        let angle = degrees.to_radians();
        landmarks.right_eye = Point::new(left.x + dx * angle.cos(), left.y + dx * angle.sin());
        portrait
    }

    /// Renders a scene with an elliptical head filling `bbox` and returns
    /// it with the matching ground-truth detection.
    #[must_use]
    pub fn with_face_box(width: u32, height: u32, bbox: BoundingBox) -> SyntheticPortrait {
        let center = bbox.center();
        let rx = bbox.width() / 2.0;
        let ry = bbox.height() / 2.0;

        let image = RgbImage::from_fn(width, height, |x, y| {
            let nx = (x as f32 - center.x) / rx.max(1.0);
            let ny = (y as f32 - center.y) / ry.max(1.0);
            if nx * nx + ny * ny <= 1.0 {
                SKIN
            } else {
                BACKDROP
            }
        });

        let eye_y = bbox.y1 + bbox.height() * 0.35;
        let detection = FaceDetection {
            bbox,
            confidence: 0.98,
            landmarks: FaceLandmarks {
                left_eye: Point::new(bbox.x1 + bbox.width() * 0.3, eye_y),
                right_eye: Point::new(bbox.x1 + bbox.width() * 0.7, eye_y),
                nose: Point::new(center.x, center.y + bbox.height() * 0.05),
                left_mouth: Point::new(
                    bbox.x1 + bbox.width() * 0.35,
                    bbox.y1 + bbox.height() * 0.75,
                ),
                right_mouth: Point::new(
                    bbox.x1 + bbox.width() * 0.65,
                    bbox.y1 + bbox.height() * 0.75,
                ),
            },
        };

        SyntheticPortrait { image, detection }
    }
}
