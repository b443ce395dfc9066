//! Trait seams for the two inference stages.
//!
//! The orchestrator talks to these ports; `inference::InferenceSession`
//! is the candle-backed implementation, and the test-support crate
//! provides mocks so pipeline behavior is testable without model
//! weights.

mod face_detector;
mod matting;

pub use face_detector::FaceDetector;
pub use matting::PortraitMatter;
