//! Named lookup tables for photo sizes, background colors, and print
//! sheets.
//!
//! The tables are configuration data, not pipeline logic: the built-in
//! entries mirror the sizes the original service shipped with, and a
//! caller can deserialize an extended table without touching any stage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ColorSpec, PhotoSizeSpec, SheetSpec};

/// Default print resolution for the built-in tables.
const DEFAULT_DPI: u32 = 300;

/// Named photo sizes, colors, and sheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetTable {
    /// Photo size by label.
    pub photo_sizes: HashMap<String, PhotoSizeSpec>,
    /// Background color by label.
    pub colors: HashMap<String, ColorSpec>,
    /// Sheet size by label.
    pub sheets: HashMap<String, SheetSpec>,
}

impl PresetTable {
    /// The built-in table, pixel dimensions at 300 dpi.
    #[must_use]
    pub fn builtin() -> Self {
        let photo_sizes = [
            ("one-inch", PhotoSizeSpec::new(295, 413, DEFAULT_DPI)),
            ("two-inch", PhotoSizeSpec::new(413, 579, DEFAULT_DPI)),
            ("small-two-inch", PhotoSizeSpec::new(413, 531, DEFAULT_DPI)),
            ("passport", PhotoSizeSpec::new(390, 567, DEFAULT_DPI)),
            ("drivers-license", PhotoSizeSpec::new(260, 378, DEFAULT_DPI)),
            ("social-security", PhotoSizeSpec::new(358, 441, DEFAULT_DPI)),
        ];
        let colors = [
            ("blue", ColorSpec::new(86, 140, 212)),
            ("white", ColorSpec::new(255, 255, 255)),
            ("red", ColorSpec::new(205, 50, 57)),
            ("gray", ColorSpec::new(128, 128, 128)),
        ];
        let sheets = [
            ("six-inch", SheetSpec::new(1800, 1200)),
            ("five-inch", SheetSpec::new(1500, 1050)),
            ("four-inch", SheetSpec::new(1200, 800)),
        ];

        Self {
            photo_sizes: photo_sizes
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
            colors: colors.into_iter().map(|(k, v)| (k.to_owned(), v)).collect(),
            sheets: sheets.into_iter().map(|(k, v)| (k.to_owned(), v)).collect(),
        }
    }

    /// Looks up a photo size by label.
    #[must_use]
    pub fn photo_size(&self, name: &str) -> Option<PhotoSizeSpec> {
        self.photo_sizes.get(name).copied()
    }

    /// Looks up a background color by label.
    #[must_use]
    pub fn color(&self, name: &str) -> Option<ColorSpec> {
        self.colors.get(name).copied()
    }

    /// Looks up a sheet size by label.
    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<SheetSpec> {
        self.sheets.get(name).copied()
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::builtin()
    }
}
