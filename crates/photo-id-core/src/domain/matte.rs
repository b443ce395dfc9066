//! Alpha matte: per-pixel foreground opacity co-registered with a source
//! image.

/// Single-channel opacity mask with values in [0, 1], row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMatte {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl AlphaMatte {
    /// Creates a matte from raw row-major data.
    ///
    /// Returns `None` if `data.len() != width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a matte by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y).clamp(0.0, 1.0));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Matte width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Matte height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Opacity at integer pixel coordinates. Out-of-range coordinates are
    /// clamped to the nearest edge pixel.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        let x = x.min(self.width.saturating_sub(1)) as usize;
        let y = y.min(self.height.saturating_sub(1)) as usize;
        self.data[y * self.width as usize + x]
    }

    /// Bilinearly sampled opacity at fractional pixel coordinates.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (self.width.saturating_sub(1)) as f32);
        let y = y.clamp(0.0, (self.height.saturating_sub(1)) as f32);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width.saturating_sub(1));
        let y1 = (y0 + 1).min(self.height.saturating_sub(1));

        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Returns a new matte resized to `width` x `height` by bilinear
    /// sampling. The caller is responsible for checking aspect-ratio
    /// compatibility; this function never crops.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let sx = self.width as f32 / width.max(1) as f32;
        let sy = self.height as f32 / height.max(1) as f32;
        Self::from_fn(width, height, |x, y| {
            // Sample at the destination pixel center mapped into source space.
            self.sample((x as f32 + 0.5) * sx - 0.5, (y as f32 + 0.5) * sy - 0.5)
        })
    }

    /// Extracts a sub-rectangle of the matte.
    ///
    /// Returns `None` if the rectangle exceeds the matte extent.
    #[must_use]
    pub fn cropped(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if x + width > self.width || y + height > self.height {
            return None;
        }
        Some(Self::from_fn(width, height, |cx, cy| {
            self.get(x + cx, y + cy)
        }))
    }

    /// Converts opacity to an 8-bit alpha value at the given pixel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn alpha_u8(&self, x: u32, y: u32) -> u8 {
        (self.get(x, y) * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

/// The two mattes produced per pipeline run: preview resolution and
/// source resolution.
#[derive(Debug, Clone)]
pub struct MattePair {
    /// Standard matte, sized for screen preview.
    pub standard: AlphaMatte,
    /// High-definition matte at source resolution.
    pub hd: AlphaMatte,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_length_check() {
        assert!(AlphaMatte::from_raw(2, 2, vec![0.0; 3]).is_none());
        assert!(AlphaMatte::from_raw(2, 2, vec![0.0; 4]).is_some());
    }

    #[test]
    fn test_from_fn_clamps() {
        let matte = AlphaMatte::from_fn(2, 1, |x, _| if x == 0 { -1.0 } else { 2.0 });
        assert!((matte.get(0, 0) - 0.0).abs() < f32::EPSILON);
        assert!((matte.get(1, 0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sample_midpoint() {
        let matte = AlphaMatte::from_fn(2, 1, |x, _| x as f32);
        assert!((matte.sample(0.5, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_resized_identity() {
        let matte = AlphaMatte::from_fn(4, 4, |x, y| ((x + y) % 2) as f32);
        let same = matte.resized(4, 4);
        assert_eq!(matte, same);
    }

    #[test]
    fn test_resized_uniform_stays_uniform() {
        let matte = AlphaMatte::from_fn(8, 8, |_, _| 0.5);
        let up = matte.resized(16, 16);
        assert_eq!(up.width(), 16);
        assert_eq!(up.height(), 16);
        for y in 0..16 {
            for x in 0..16 {
                assert!((up.get(x, y) - 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_cropped_bounds() {
        let matte = AlphaMatte::from_fn(4, 4, |x, _| x as f32 / 3.0);
        assert!(matte.cropped(2, 2, 3, 1).is_none());
        let sub = matte.cropped(1, 0, 2, 2).unwrap();
        assert_eq!(sub.width(), 2);
        assert!((sub.get(0, 0) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_u8_rounding() {
        let matte = AlphaMatte::from_fn(1, 1, |_, _| 0.5);
        assert_eq!(matte.alpha_u8(0, 0), 128);
    }
}
