//! Test support for the ID photo pipeline: mock inference ports and
//! synthetic portrait builders.

mod builders;
mod mocks;

pub use builders::{SyntheticPortrait, SyntheticPortraitBuilder};
pub use mocks::{MockFaceDetector, MockPortraitMatter};
