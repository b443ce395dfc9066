//! Background color specification.

use serde::{Deserialize, Serialize};

use super::PipelineError;

/// An RGB background color, nominally one byte per channel.
///
/// Channels are stored wide so that the compositor can enforce its own
/// range guard on triples constructed programmatically rather than
/// parsed from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSpec {
    /// Red channel, 0-255.
    pub r: u16,
    /// Green channel, 0-255.
    pub g: u16,
    /// Blue channel, 0-255.
    pub b: u16,
}

impl ColorSpec {
    /// Creates a color from byte channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as u16,
            g: g as u16,
            b: b as u16,
        }
    }

    /// Parses a 6-hex-digit wire color such as `"568CD4"` or `"#FFFFFF"`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for anything that is not exactly six
    /// hex digits (plus an optional leading `#`).
    pub fn from_hex(hex: &str) -> Result<Self, PipelineError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "color must be 6 hex digits, got {hex:?}"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            // Range is always a valid 2-digit hex slice after the check above.
            u8::from_str_radix(&digits[range], 16).unwrap_or(0)
        };
        Ok(Self::new(channel(0..2), channel(2..4), channel(4..6)))
    }

    /// Returns true if every channel lies in [0, 255].
    #[must_use]
    pub const fn in_range(&self) -> bool {
        self.r <= 255 && self.g <= 255 && self.b <= 255
    }

    /// Channels as bytes. Caller must have checked [`Self::in_range`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn channels(&self) -> [u8; 3] {
        [self.r as u8, self.g as u8, self.b as u8]
    }
}
