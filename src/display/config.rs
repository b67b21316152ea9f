//! # Display Configuration
//!
//! This module defines the hardware characteristics of the supported panel.
//!
//! ## Supported Panels
//!
//! | Model | Resolution | Colors | Model id |
//! |-------|------------|--------|----------|
//! | IL075U | 800×480 | BW | 0xC4 |
//! | IL075RU | 800×480 | BW, BWR | 0xC4 |
//! | GDP075FU1 | 800×480 | BW, BWR, BWRY | 0xC4 |
//!
//! ## Plane Sizes
//!
//! ```text
//! 1-bit plane:    800 × 480 / 8 = 48000 bytes
//! 2-bit combined: 800 × 480 / 4 = 96000 bytes
//! ```

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// # Display Configuration
///
/// Fixed geometry and identification of an e-ink panel driven over serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Panel family name
    pub name: &'static str,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Model byte sent in the handshake request
    pub model_id: u8,
}

impl DisplayConfig {
    /// # 7.5 inch 800×480 panel
    ///
    /// Shared by the IL075U (BW), IL075RU (BWR) and GDP075FU1 (BWRY)
    /// controller boards.
    pub const IL075: Self = Self {
        name: "7.5in 800x480",
        width: 800,
        height: 480,
        model_id: 0xC4,
    };

    /// Number of pixels in one frame
    #[inline]
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Length of a 1-bit plane: `W*H/8`
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.pixels() / 8
    }

    /// Length of the 2-bit combined BWRY plane: `W*H/4`
    #[inline]
    pub fn combined_plane_len(&self) -> usize {
        self.pixels() / 4
    }

    /// Total bytes streamed to the device for a color mode.
    pub fn payload_len(&self, mode: ColorMode) -> usize {
        match mode {
            ColorMode::Bw => self.plane_len(),
            ColorMode::Bwr => self.plane_len() * 2,
            ColorMode::Bwry => self.combined_plane_len(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::IL075
    }
}

/// Color mode the device is asked to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Black and white, one 1-bit plane
    #[default]
    Bw,
    /// Black, white and red, two 1-bit planes
    Bwr,
    /// Black, white, red and yellow, one 2-bit plane
    Bwry,
}

/// Handshake flag: no extra color plane
pub const COLOR_FLAG_NONE: u8 = 0x00;

/// Handshake flag: a red plane follows the black one
pub const COLOR_FLAG_BWR: u8 = 0x01;

/// Handshake flag: the payload is a combined 4-color plane
pub const COLOR_FLAG_BWRY: u8 = 0x04;

impl ColorMode {
    /// Flag byte at handshake offset 7.
    pub fn primary_flag(self) -> u8 {
        match self {
            Self::Bwr => COLOR_FLAG_BWR,
            _ => COLOR_FLAG_NONE,
        }
    }

    /// Flag byte at handshake offset 5.
    pub fn secondary_flag(self) -> u8 {
        match self {
            Self::Bwry => COLOR_FLAG_BWRY,
            _ => COLOR_FLAG_NONE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bw => "bw",
            Self::Bwr => "bwr",
            Self::Bwry => "bwry",
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_il075_plane_sizes() {
        let display = DisplayConfig::IL075;
        assert_eq!(display.pixels(), 384_000);
        assert_eq!(display.plane_len(), 48_000);
        assert_eq!(display.combined_plane_len(), 96_000);
    }

    #[test]
    fn test_payload_len_per_mode() {
        let display = DisplayConfig::default();
        assert_eq!(display.payload_len(ColorMode::Bw), 48_000);
        assert_eq!(display.payload_len(ColorMode::Bwr), 96_000);
        assert_eq!(display.payload_len(ColorMode::Bwry), 96_000);
    }

    #[test]
    fn test_color_flags() {
        assert_eq!(ColorMode::Bw.primary_flag(), 0x00);
        assert_eq!(ColorMode::Bw.secondary_flag(), 0x00);
        assert_eq!(ColorMode::Bwr.primary_flag(), 0x01);
        assert_eq!(ColorMode::Bwr.secondary_flag(), 0x00);
        assert_eq!(ColorMode::Bwry.primary_flag(), 0x00);
        assert_eq!(ColorMode::Bwry.secondary_flag(), 0x04);
    }
}
