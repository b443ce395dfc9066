//! Photo geometry specifications: target size, alignment ratios, print
//! sheets.

use serde::{Deserialize, Serialize};

use super::PipelineError;

/// Millimetres per inch, for physical-to-pixel conversion.
const MM_PER_INCH: f64 = 25.4;

/// Target photo size: pixel dimensions coupled to a print resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSizeSpec {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Print resolution in dots per inch.
    pub dpi: u32,
}

impl PhotoSizeSpec {
    /// Creates a spec from explicit pixel dimensions and dpi.
    #[must_use]
    pub const fn new(width: u32, height: u32, dpi: u32) -> Self {
        Self { width, height, dpi }
    }

    /// Derives pixel dimensions from a physical size in millimetres at the
    /// given dpi, rounding to the nearest pixel. A 25x35 mm photo at
    /// 300 dpi yields 295x413 px.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_millimetres(width_mm: f64, height_mm: f64, dpi: u32) -> Self {
        let px = |mm: f64| (mm / MM_PER_INCH * f64::from(dpi)).round().max(0.0) as u32;
        Self {
            width: px(width_mm),
            height: px(height_mm),
            dpi,
        }
    }

    /// Width / height aspect ratio.
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }

    /// Checks that dimensions and dpi are positive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for zero width, height, or dpi.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "photo dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.dpi == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "dpi must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Head-geometry constraints for the aligned crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRatios {
    /// Target head height as a fraction of frame height.
    pub head_measure_ratio: f32,
    /// Natural vertical position of the face center as a fraction of
    /// frame height, before band clamping.
    pub head_height_ratio: f32,
    /// Lower bound of the allowed top-gap band (fraction of frame height).
    pub top_distance_min: f32,
    /// Upper bound of the allowed top-gap band (fraction of frame height).
    pub top_distance_max: f32,
}

impl Default for AlignmentRatios {
    fn default() -> Self {
        Self {
            head_measure_ratio: 0.2,
            head_height_ratio: 0.45,
            top_distance_min: 0.1,
            top_distance_max: 0.12,
        }
    }
}

impl AlignmentRatios {
    /// Checks the ratio invariants: every field in [0, 1],
    /// `head_measure_ratio` strictly positive, and
    /// `top_distance_min <= top_distance_max`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` describing the first violated
    /// invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(PipelineError::InvalidConfiguration(format!(
                    "{name} must lie in [0, 1], got {value}"
                )))
            }
        };
        unit("head_measure_ratio", self.head_measure_ratio)?;
        unit("head_height_ratio", self.head_height_ratio)?;
        unit("top_distance_min", self.top_distance_min)?;
        unit("top_distance_max", self.top_distance_max)?;

        if self.head_measure_ratio <= 0.0 {
            return Err(PipelineError::InvalidConfiguration(
                "head_measure_ratio must be strictly positive".into(),
            ));
        }
        if self.top_distance_min > self.top_distance_max {
            return Err(PipelineError::InvalidConfiguration(format!(
                "top_distance_min ({}) exceeds top_distance_max ({})",
                self.top_distance_min, self.top_distance_max
            )));
        }
        Ok(())
    }
}

/// A printable sheet's pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSpec {
    /// Sheet width in pixels.
    pub width: u32,
    /// Sheet height in pixels.
    pub height: u32,
}

impl SheetSpec {
    /// Creates a sheet spec from pixel dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Derives sheet pixel dimensions from a physical size in millimetres
    /// at the given dpi.
    #[must_use]
    pub fn from_millimetres(width_mm: f64, height_mm: f64, dpi: u32) -> Self {
        let size = PhotoSizeSpec::from_millimetres(width_mm, height_mm, dpi);
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_inch_from_millimetres() {
        let spec = PhotoSizeSpec::from_millimetres(25.0, 35.0, 300);
        assert_eq!(spec.width, 295);
        assert_eq!(spec.height, 413);
        assert_eq!(spec.dpi, 300);
    }

    #[test]
    fn test_aspect_ratio() {
        let spec = PhotoSizeSpec::new(300, 400, 300);
        assert!((spec.aspect_ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_zero_dims() {
        assert!(PhotoSizeSpec::new(0, 413, 300).validate().is_err());
        assert!(PhotoSizeSpec::new(295, 0, 300).validate().is_err());
        assert!(PhotoSizeSpec::new(295, 413, 0).validate().is_err());
        assert!(PhotoSizeSpec::new(295, 413, 300).validate().is_ok());
    }

    #[test]
    fn test_default_ratios_valid() {
        assert!(AlignmentRatios::default().validate().is_ok());
    }

    #[test]
    fn test_ratios_reject_inverted_band() {
        let ratios = AlignmentRatios {
            top_distance_min: 0.2,
            top_distance_max: 0.1,
            ..AlignmentRatios::default()
        };
        assert!(matches!(
            ratios.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_ratios_reject_out_of_unit_range() {
        let ratios = AlignmentRatios {
            head_measure_ratio: 1.5,
            ..AlignmentRatios::default()
        };
        assert!(ratios.validate().is_err());

        let ratios = AlignmentRatios {
            top_distance_min: -0.1,
            ..AlignmentRatios::default()
        };
        assert!(ratios.validate().is_err());
    }

    #[test]
    fn test_ratios_reject_zero_head_measure() {
        let ratios = AlignmentRatios {
            head_measure_ratio: 0.0,
            ..AlignmentRatios::default()
        };
        assert!(ratios.validate().is_err());
    }

    #[test]
    fn test_sheet_from_millimetres() {
        // 6-inch sheet: 152.4 x 101.6 mm at 300 dpi.
        let sheet = SheetSpec::from_millimetres(152.4, 101.6, 300);
        assert_eq!(sheet.width, 1800);
        assert_eq!(sheet.height, 1200);
    }
}
