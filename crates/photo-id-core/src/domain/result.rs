//! Pipeline result types.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// The finished photo pair. Both renderings share the requested target
/// pixel dimensions; the hd variant was rendered from the
/// full-resolution matte and native-resolution crop.
#[derive(Debug, Clone)]
pub struct IdPhotoResult {
    /// Standard rendering.
    pub standard: RgbImage,
    /// High-definition rendering.
    pub hd: RgbImage,
    /// Print resolution both renderings embed.
    pub dpi: u32,
}

/// One photo placement on a print sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Grid row, 0-based.
    pub row: u32,
    /// Grid column, 0-based.
    pub column: u32,
    /// Left pixel offset on the sheet.
    pub x: u32,
    /// Top pixel offset on the sheet.
    pub y: u32,
}

/// A packed print sheet: grid geometry plus every placement offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSheet {
    /// Sheet width in pixels.
    pub width: u32,
    /// Sheet height in pixels.
    pub height: u32,
    /// Print resolution.
    pub dpi: u32,
    /// Number of grid rows.
    pub rows: u32,
    /// Number of grid columns.
    pub columns: u32,
    /// Width of one photo cell in pixels.
    pub photo_width: u32,
    /// Height of one photo cell in pixels.
    pub photo_height: u32,
    /// Margin reserved on every sheet edge, in pixels.
    pub margin: u32,
    /// Gutter between adjacent photos, in pixels.
    pub gutter: u32,
    /// Row-major placements.
    pub placements: Vec<Placement>,
}

impl LayoutSheet {
    /// Total number of photo copies on the sheet.
    #[must_use]
    pub fn count(&self) -> usize {
        self.placements.len()
    }

    /// Renders the sheet raster: white margin fill with the photo copied
    /// at every placement. The photo is expected at
    /// `photo_width` x `photo_height`; other sizes are resized first.
    #[must_use]
    pub fn render(&self, photo: &RgbImage) -> RgbImage {
        let mut sheet = RgbImage::from_pixel(self.width, self.height, Rgb([255, 255, 255]));

        let cell;
        let photo = if photo.dimensions() == (self.photo_width, self.photo_height) {
            photo
        } else {
            cell = image::imageops::resize(
                photo,
                self.photo_width,
                self.photo_height,
                image::imageops::FilterType::Lanczos3,
            );
            &cell
        };

        for placement in &self.placements {
            image::imageops::replace(
                &mut sheet,
                photo,
                i64::from(placement.x),
                i64::from(placement.y),
            );
        }
        sheet
    }
}
