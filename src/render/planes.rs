//! # Plane Encoding
//!
//! Packs dithered black/white images into the byte planes the panel
//! controller expects, and prepares the final payload for the wire.
//!
//! ## 1-bit Planes (BW, BWR)
//!
//! One bit per pixel, row-major, MSB first. A set bit is paper (white), a
//! cleared bit is ink:
//!
//! ```text
//! pixels: ░ ░ █ █ ░ █ ░ ░
//! byte:   1 1 0 0 1 0 1 1  = 0xCB
//! ```
//!
//! ## 2-bit Combined Plane (BWRY)
//!
//! Four pixels per byte, leftmost pixel in the two highest bits:
//!
//! | Color | Code |
//! |-------|------|
//! | Black | `0b00` |
//! | White | `0b01` |
//! | Yellow | `0b10` |
//! | Red | `0b11` |
//!
//! A pixel claimed by several ink planes gets the first color of the
//! [`BlendOrder`]; a pixel claimed by none is white.
//!
//! ## Escaping
//!
//! The device frames chunks with CR LF, so any packed `0x0D` is rewritten to
//! `0x0C` before the payload leaves this module.

use std::str::FromStr;

use clap::ValueEnum;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::dither::pack_row;
use crate::display::{ColorMode, DisplayConfig};
use crate::error::PaperlinkError;

/// Carriage return, the wire's line terminator
pub const CR: u8 = 0x0D;

/// Replacement for a CR inside payload data
pub const ESCAPED_CR: u8 = 0x0C;

/// An ink color that can claim a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InkColor {
    Black,
    Red,
    Yellow,
}

/// Final color of a pixel in the combined plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelColor {
    Black,
    White,
    Red,
    Yellow,
}

impl PixelColor {
    /// 2-bit wire code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Black => 0b00,
            Self::White => 0b01,
            Self::Yellow => 0b10,
            Self::Red => 0b11,
        }
    }
}

impl From<InkColor> for PixelColor {
    fn from(ink: InkColor) -> Self {
        match ink {
            InkColor::Black => Self::Black,
            InkColor::Red => Self::Red,
            InkColor::Yellow => Self::Yellow,
        }
    }
}

/// Priority of ink colors when several planes claim the same pixel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<InkColor>", into = "Vec<InkColor>")]
pub struct BlendOrder(Vec<InkColor>);

impl BlendOrder {
    /// Build an order. Colors may be omitted but not repeated.
    pub fn new(order: Vec<InkColor>) -> Result<Self, PaperlinkError> {
        for (i, color) in order.iter().enumerate() {
            if order[..i].contains(color) {
                return Err(PaperlinkError::Validation(format!(
                    "blend order lists {:?} twice",
                    color
                )));
            }
        }
        Ok(Self(order))
    }

    pub fn colors(&self) -> &[InkColor] {
        &self.0
    }

    /// Pick the color of a pixel from its per-plane classifications.
    pub fn resolve(&self, black: bool, red: bool, yellow: bool) -> PixelColor {
        self.0
            .iter()
            .copied()
            .find(|ink| match ink {
                InkColor::Black => black,
                InkColor::Red => red,
                InkColor::Yellow => yellow,
            })
            .map(PixelColor::from)
            .unwrap_or(PixelColor::White)
    }
}

/// `red,yellow,black`: colors paint over black.
impl Default for BlendOrder {
    fn default() -> Self {
        Self(vec![InkColor::Red, InkColor::Yellow, InkColor::Black])
    }
}

impl TryFrom<Vec<InkColor>> for BlendOrder {
    type Error = PaperlinkError;

    fn try_from(order: Vec<InkColor>) -> Result<Self, Self::Error> {
        Self::new(order)
    }
}

impl From<BlendOrder> for Vec<InkColor> {
    fn from(order: BlendOrder) -> Self {
        order.0
    }
}

impl FromStr for BlendOrder {
    type Err = PaperlinkError;

    /// Parse a comma separated list, e.g. `"red,black,yellow"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let colors = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                <InkColor as ValueEnum>::from_str(part, true).map_err(|_| {
                    PaperlinkError::Validation(format!("unknown blend color '{}'", part))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(colors)
    }
}

/// Whether a dithered pixel was pushed to ink.
#[inline]
pub fn is_ink(pixel: &Rgba<u8>) -> bool {
    pixel[0] < 128
}

/// Pack a dithered image into a 1-bit plane (`W*H/8` bytes).
///
/// The plane is not escaped; see [`escape`].
pub fn encode(image: &RgbaImage) -> Vec<u8> {
    let paper: Vec<bool> = image.pixels().map(|p| !is_ink(p)).collect();
    pack_row(&paper)
}

/// Pack three dithered images into the 2-bit combined plane (`W*H/4` bytes).
pub fn encode_combined(
    black: &RgbaImage,
    red: &RgbaImage,
    yellow: &RgbaImage,
    order: &BlendOrder,
) -> Result<Vec<u8>, PaperlinkError> {
    let (width, height) = black.dimensions();
    if red.dimensions() != (width, height) || yellow.dimensions() != (width, height) {
        return Err(PaperlinkError::Validation(format!(
            "plane dimensions differ: black {:?}, red {:?}, yellow {:?}",
            black.dimensions(),
            red.dimensions(),
            yellow.dimensions()
        )));
    }
    if width % 4 != 0 {
        return Err(PaperlinkError::Validation(format!(
            "combined plane width {} is not a multiple of 4",
            width
        )));
    }

    let mut out = Vec::with_capacity(width as usize * height as usize / 4);
    for y in 0..height {
        for x_start in (0..width).step_by(4) {
            let mut byte = 0u8;
            for x in x_start..x_start + 4 {
                let color = order.resolve(
                    is_ink(black.get_pixel(x, y)),
                    is_ink(red.get_pixel(x, y)),
                    is_ink(yellow.get_pixel(x, y)),
                );
                byte = (byte << 2) | color.code();
            }
            out.push(byte);
        }
    }

    Ok(out)
}

/// Rewrite every CR byte to `0x0C`, in place.
pub fn escape(buf: &mut [u8]) {
    for byte in buf.iter_mut().filter(|b| **b == CR) {
        *byte = ESCAPED_CR;
    }
}

/// A validated, escaped payload ready for the transfer protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    mode: ColorMode,
    payload: Vec<u8>,
}

impl PrintJob {
    /// Black/white job from one 1-bit plane.
    pub fn bw(display: &DisplayConfig, plane: Vec<u8>) -> Result<Self, PaperlinkError> {
        check_len("BW", &plane, display.plane_len())?;
        Ok(Self::escaped(ColorMode::Bw, plane))
    }

    /// Black/white/red job from two 1-bit planes, black plane first.
    pub fn bwr(
        display: &DisplayConfig,
        black: Vec<u8>,
        red: Vec<u8>,
    ) -> Result<Self, PaperlinkError> {
        check_len("BW", &black, display.plane_len())?;
        check_len("RW", &red, display.plane_len())?;
        let mut payload = black;
        payload.extend_from_slice(&red);
        Ok(Self::escaped(ColorMode::Bwr, payload))
    }

    /// Black/white/red/yellow job from the combined 2-bit plane.
    pub fn bwry(display: &DisplayConfig, combined: Vec<u8>) -> Result<Self, PaperlinkError> {
        check_len("BWRY", &combined, display.combined_plane_len())?;
        Ok(Self::escaped(ColorMode::Bwry, combined))
    }

    fn escaped(mode: ColorMode, mut payload: Vec<u8>) -> Self {
        escape(&mut payload);
        Self { mode, payload }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

fn check_len(name: &str, plane: &[u8], expected: usize) -> Result<(), PaperlinkError> {
    if plane.len() != expected {
        return Err(PaperlinkError::Validation(format!(
            "{} image data length mismatch: expected {} bytes, got {}",
            name,
            expected,
            plane.len()
        )));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
