//! Portrait matting port.

use image::RgbImage;

use crate::domain::{MattePair, PipelineError};

/// Port for separating the subject from its background.
pub trait PortraitMatter: Send + Sync {
    /// Produces the standard and high-definition mattes for `image`.
    ///
    /// Both mattes preserve the source aspect ratio: the hd matte at
    /// source resolution, the standard matte with its long edge at most
    /// `preview_edge` pixels.
    ///
    /// # Errors
    ///
    /// Returns `MattingFailure` when inference cannot produce a matte of
    /// the source's aspect ratio.
    fn matte(&self, image: &RgbImage, preview_edge: u32) -> Result<MattePair, PipelineError>;
}
