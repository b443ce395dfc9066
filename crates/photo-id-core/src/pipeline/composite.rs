//! Background compositor.
//!
//! Alpha-blends the matted subject onto a solid color. The function has
//! no knowledge of which variant it renders; the orchestrator invokes it
//! once per variant with different resolution inputs.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use image::{Rgb, RgbImage, RgbaImage};

use crate::domain::{AlphaMatte, ColorSpec, PipelineError};

/// Tolerated aspect-ratio slack from integer rounding, expressed per
/// pixel of the shorter height.
const ASPECT_SLACK_PIXELS: f64 = 2.0;

/// Blends `subject` over `color` using `matte` as per-pixel opacity.
///
/// The matte is resized (bilinear, never cropped) when its resolution
/// differs from the subject's, provided the aspect ratios agree within
/// rounding.
///
/// # Errors
///
/// Returns `InvalidColor` if a color channel is out of range and
/// `ResolutionMismatch` if the matte cannot be aligned to the subject's
/// aspect ratio.
pub fn composite(
    subject: &RgbImage,
    matte: &AlphaMatte,
    color: ColorSpec,
) -> Result<RgbImage, PipelineError> {
    if !color.in_range() {
        return Err(PipelineError::InvalidColor);
    }
    check_aspect(matte, subject.width(), subject.height())?;

    let matte = matte.resized(subject.width(), subject.height());
    let [bg_r, bg_g, bg_b] = color.channels();

    let mut output = RgbImage::new(subject.width(), subject.height());
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let alpha = matte.get(x, y);
        let fg = subject.get_pixel(x, y);
        *pixel = Rgb([
            blend(fg[0], bg_r, alpha),
            blend(fg[1], bg_g, alpha),
            blend(fg[2], bg_b, alpha),
        ]);
    }
    Ok(output)
}

/// Blends a photo that already carries its matte as an alpha channel
/// onto a solid color. This is the standalone background-replacement
/// operation.
///
/// # Errors
///
/// Returns `InvalidColor` if a color channel is out of range.
pub fn composite_rgba(photo: &RgbaImage, color: ColorSpec) -> Result<RgbImage, PipelineError> {
    if !color.in_range() {
        return Err(PipelineError::InvalidColor);
    }
    let [bg_r, bg_g, bg_b] = color.channels();

    let mut output = RgbImage::new(photo.width(), photo.height());
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let source = photo.get_pixel(x, y);
        let alpha = f32::from(source[3]) / 255.0;
        *pixel = Rgb([
            blend(source[0], bg_r, alpha),
            blend(source[1], bg_g, alpha),
            blend(source[2], bg_b, alpha),
        ]);
    }
    Ok(output)
}

/// Per-channel blend: `fg * alpha + bg * (1 - alpha)`, rounded.
fn blend(fg: u8, bg: u8, alpha: f32) -> u8 {
    (f32::from(fg) * alpha + f32::from(bg) * (1.0 - alpha))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Verifies the matte can be aligned to the subject by resizing alone.
fn check_aspect(matte: &AlphaMatte, width: u32, height: u32) -> Result<(), PipelineError> {
    let matte_aspect = f64::from(matte.width()) / f64::from(matte.height().max(1));
    let crop_aspect = f64::from(width) / f64::from(height.max(1));
    let slack = ASPECT_SLACK_PIXELS / f64::from(matte.height().min(height).max(1));

    if (matte_aspect - crop_aspect).abs() > slack {
        return Err(PipelineError::ResolutionMismatch {
            matte_width: matte.width(),
            matte_height: matte.height(),
            crop_width: width,
            crop_height: height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: ColorSpec = ColorSpec::new(255, 255, 255);

    fn subject(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn test_opaque_matte_keeps_subject() {
        let fg = subject(8, 8, 40);
        let matte = AlphaMatte::from_fn(8, 8, |_, _| 1.0);
        let out = composite(&fg, &matte, WHITE).unwrap();
        assert_eq!(out.get_pixel(3, 3), &Rgb([40, 40, 40]));
    }

    #[test]
    fn test_transparent_matte_paints_background() {
        let fg = subject(8, 8, 40);
        let matte = AlphaMatte::from_fn(8, 8, |_, _| 0.0);
        let out = composite(&fg, &matte, ColorSpec::new(86, 140, 212)).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([86, 140, 212]));
    }

    #[test]
    fn test_half_alpha_blends() {
        let fg = subject(4, 4, 0);
        let matte = AlphaMatte::from_fn(4, 4, |_, _| 0.5);
        let out = composite(&fg, &matte, ColorSpec::new(200, 100, 50)).unwrap();
        assert_eq!(out.get_pixel(1, 1), &Rgb([100, 50, 25]));
    }

    #[test]
    fn test_matte_resized_to_subject() {
        // Matte at half resolution, same aspect ratio.
        let fg = subject(16, 24, 10);
        let matte = AlphaMatte::from_fn(8, 12, |_, _| 0.0);
        let out = composite(&fg, &matte, WHITE).unwrap();
        assert_eq!(out.dimensions(), (16, 24));
        assert_eq!(out.get_pixel(8, 12), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_aspect_mismatch_rejected() {
        let fg = subject(100, 100, 10);
        let matte = AlphaMatte::from_fn(100, 200, |_, _| 1.0);
        let err = composite(&fg, &matte, WHITE).unwrap_err();
        assert!(matches!(err, PipelineError::ResolutionMismatch { .. }));
    }

    #[test]
    fn test_out_of_range_color_rejected() {
        let fg = subject(4, 4, 10);
        let matte = AlphaMatte::from_fn(4, 4, |_, _| 1.0);
        let color = ColorSpec { r: 400, g: 0, b: 0 };
        let err = composite(&fg, &matte, color).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidColor));
    }

    #[test]
    fn test_deterministic() {
        let fg = subject(32, 32, 77);
        let matte = AlphaMatte::from_fn(32, 32, |x, y| ((x + y) % 3) as f32 / 2.0);
        let a = composite(&fg, &matte, ColorSpec::new(86, 140, 212)).unwrap();
        let b = composite(&fg, &matte, ColorSpec::new(86, 140, 212)).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_composite_rgba_uses_embedded_alpha() {
        let mut photo = RgbaImage::new(2, 1);
        photo.put_pixel(0, 0, image::Rgba([50, 60, 70, 255]));
        photo.put_pixel(1, 0, image::Rgba([50, 60, 70, 0]));

        let out = composite_rgba(&photo, WHITE).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([50, 60, 70]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_composite_rgba_rejects_bad_color() {
        let photo = RgbaImage::new(2, 2);
        let color = ColorSpec { r: 0, g: 300, b: 0 };
        assert!(matches!(
            composite_rgba(&photo, color),
            Err(PipelineError::InvalidColor)
        ));
    }
}
