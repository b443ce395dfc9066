//! Face detection domain types.

use serde::{Deserialize, Serialize};

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in pixel coordinates with `x1 < x2`, `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Box height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Box center point.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// The five facial landmarks located by the detector, in detector
/// output order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    /// Left eye center.
    pub left_eye: Point,
    /// Right eye center.
    pub right_eye: Point,
    /// Nose tip.
    pub nose: Point,
    /// Left mouth corner.
    pub left_mouth: Point,
    /// Right mouth corner.
    pub right_mouth: Point,
}

/// A detected face: bounding box, confidence, and five landmarks, all in
/// source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Face bounding box.
    pub bbox: BoundingBox,
    /// Detection confidence in [0, 1].
    pub confidence: f32,
    /// Facial landmarks.
    pub landmarks: FaceLandmarks,
}

impl FaceDetection {
    /// In-plane roll angle of the eye line, in radians. Zero means the
    /// eyes are level.
    #[must_use]
    pub fn eye_line_angle(&self) -> f32 {
        let dy = self.landmarks.right_eye.y - self.landmarks.left_eye.y;
        let dx = self.landmarks.right_eye.x - self.landmarks.left_eye.x;
        dy.atan2(dx)
    }
}
