//! Core domain types for the ID photo pipeline.

mod color;
mod error;
mod face;
mod matte;
mod photo;
mod presets;
mod result;

pub use color::ColorSpec;
pub use error::PipelineError;
pub use face::{BoundingBox, FaceDetection, FaceLandmarks, Point};
pub use matte::{AlphaMatte, MattePair};
pub use photo::{AlignmentRatios, PhotoSizeSpec, SheetSpec};
pub use presets::PresetTable;
pub use result::{IdPhotoResult, LayoutSheet, Placement};
