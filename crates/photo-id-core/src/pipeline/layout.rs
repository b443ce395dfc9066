//! Print-sheet layout packer.
//!
//! Computes the maximal grid of photo copies that fits a sheet at a
//! fixed margin and inter-photo gutter, with greedy row-major placement
//! and no per-photo rotation.

use image::RgbImage;
use tracing::debug;

use crate::domain::{LayoutSheet, PipelineError, Placement, SheetSpec};

/// Margin reserved on every sheet edge, in pixels at the sheet's dpi.
pub const SHEET_MARGIN: u32 = 30;

/// Gutter between adjacent photos, in pixels.
pub const PHOTO_GUTTER: u32 = 5;

/// Packs copies of a photo onto a print sheet.
///
/// # Errors
///
/// Returns `InvalidConfiguration` for empty photo or sheet dimensions
/// and `PhotoTooLargeForSheet` when zero copies fit.
pub fn pack_sheet(
    photo: &RgbImage,
    sheet: SheetSpec,
    dpi: u32,
) -> Result<LayoutSheet, PipelineError> {
    pack(photo.width(), photo.height(), sheet, dpi)
}

/// Packs by explicit photo pixel dimensions.
///
/// # Errors
///
/// Same conditions as [`pack_sheet`].
pub fn pack(
    photo_width: u32,
    photo_height: u32,
    sheet: SheetSpec,
    dpi: u32,
) -> Result<LayoutSheet, PipelineError> {
    if photo_width == 0 || photo_height == 0 {
        return Err(PipelineError::InvalidConfiguration(
            "photo dimensions must be positive".into(),
        ));
    }
    if sheet.width == 0 || sheet.height == 0 {
        return Err(PipelineError::InvalidConfiguration(
            "sheet dimensions must be positive".into(),
        ));
    }
    if dpi == 0 {
        return Err(PipelineError::InvalidConfiguration(
            "dpi must be positive".into(),
        ));
    }

    let columns = fit_count(sheet.width, photo_width);
    let rows = fit_count(sheet.height, photo_height);
    if rows == 0 || columns == 0 {
        return Err(PipelineError::PhotoTooLargeForSheet {
            photo_width,
            photo_height,
            sheet_width: sheet.width,
            sheet_height: sheet.height,
        });
    }
    debug!(
        "Packing {}x{} photos as {rows} rows x {columns} columns on {}x{}",
        photo_width, photo_height, sheet.width, sheet.height
    );

    let mut placements = Vec::with_capacity((rows * columns) as usize);
    for row in 0..rows {
        for column in 0..columns {
            placements.push(Placement {
                row,
                column,
                x: SHEET_MARGIN + column * (photo_width + PHOTO_GUTTER),
                y: SHEET_MARGIN + row * (photo_height + PHOTO_GUTTER),
            });
        }
    }

    Ok(LayoutSheet {
        width: sheet.width,
        height: sheet.height,
        dpi,
        rows,
        columns,
        photo_width,
        photo_height,
        margin: SHEET_MARGIN,
        gutter: PHOTO_GUTTER,
        placements,
    })
}

/// Number of `cell`-sized items that fit along `edge` after both margins,
/// with one gutter between neighbors.
fn fit_count(edge: u32, cell: u32) -> u32 {
    let usable = edge.saturating_sub(2 * SHEET_MARGIN);
    if usable < cell {
        return 0;
    }
    // n cells occupy n*cell + (n-1)*gutter.
    (usable + PHOTO_GUTTER) / (cell + PHOTO_GUTTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_inch_on_six_inch_sheet() {
        let sheet = pack(295, 413, SheetSpec::new(1800, 1200), 300).unwrap();
        // Usable 1740x1140: 5 columns of 295 (+gutters), 2 rows of 413.
        assert_eq!(sheet.columns, 5);
        assert_eq!(sheet.rows, 2);
        assert_eq!(sheet.count(), 10);
    }

    #[test]
    fn test_grid_is_maximal() {
        let sheet = pack(295, 413, SheetSpec::new(1800, 1200), 300).unwrap();
        let usable_w = 1800 - 2 * SHEET_MARGIN;
        let usable_h = 1200 - 2 * SHEET_MARGIN;

        // The packed grid fits...
        assert!(sheet.columns * 295 + (sheet.columns - 1) * PHOTO_GUTTER <= usable_w);
        assert!(sheet.rows * 413 + (sheet.rows - 1) * PHOTO_GUTTER <= usable_h);
        // ...and one more row or column would not.
        assert!((sheet.columns + 1) * 295 + sheet.columns * PHOTO_GUTTER > usable_w);
        assert!((sheet.rows + 1) * 413 + sheet.rows * PHOTO_GUTTER > usable_h);
    }

    #[test]
    fn test_placements_stay_on_sheet_without_overlap() {
        let sheet = pack(295, 413, SheetSpec::new(1800, 1200), 300).unwrap();
        for p in &sheet.placements {
            assert!(p.x >= SHEET_MARGIN);
            assert!(p.y >= SHEET_MARGIN);
            assert!(p.x + 295 <= sheet.width - SHEET_MARGIN);
            assert!(p.y + 413 <= sheet.height - SHEET_MARGIN);
        }
        // Row-major placements are strictly ordered, so neighbors cannot
        // overlap given the gutter arithmetic.
        for pair in sheet.placements.windows(2) {
            let same_row = pair[0].row == pair[1].row;
            if same_row {
                assert!(pair[1].x >= pair[0].x + 295 + PHOTO_GUTTER);
            } else {
                assert!(pair[1].y >= pair[0].y + 413 + PHOTO_GUTTER);
            }
        }
    }

    #[test]
    fn test_photo_too_large() {
        let err = pack(1300, 900, SheetSpec::new(1200, 800), 300).unwrap_err();
        assert!(matches!(err, PipelineError::PhotoTooLargeForSheet { .. }));
    }

    #[test]
    fn test_photo_barely_fits_margins() {
        // Sheet interior is exactly one cell.
        let sheet = pack(
            100,
            100,
            SheetSpec::new(100 + 2 * SHEET_MARGIN, 100 + 2 * SHEET_MARGIN),
            300,
        )
        .unwrap();
        assert_eq!(sheet.count(), 1);
        assert_eq!(sheet.placements[0].x, SHEET_MARGIN);
        assert_eq!(sheet.placements[0].y, SHEET_MARGIN);
    }

    #[test]
    fn test_margin_excludes_otherwise_fitting_photo() {
        // Photo fits the raw sheet but not the margined interior.
        let err = pack(100, 100, SheetSpec::new(110, 110), 300).unwrap_err();
        assert!(matches!(err, PipelineError::PhotoTooLargeForSheet { .. }));
    }

    #[test]
    fn test_rejects_zero_inputs() {
        assert!(pack(0, 100, SheetSpec::new(1000, 1000), 300).is_err());
        assert!(pack(100, 100, SheetSpec::new(0, 1000), 300).is_err());
        assert!(pack(100, 100, SheetSpec::new(1000, 1000), 0).is_err());
    }

    #[test]
    fn test_pack_sheet_uses_photo_dimensions() {
        let photo = RgbImage::new(295, 413);
        let sheet = pack_sheet(&photo, SheetSpec::new(1800, 1200), 300).unwrap();
        assert_eq!(sheet.photo_width, 295);
        assert_eq!(sheet.photo_height, 413);
        assert_eq!(sheet.count(), 10);
    }
}
