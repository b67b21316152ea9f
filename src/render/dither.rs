//! # Error-Diffusion Dithering
//!
//! This module converts a continuous-tone RGBA frame into a binary
//! (ink/paper) image for one ink plane, spreading the quantization error of
//! every pixel onto its not-yet-visited neighbors.
//!
//! ## Algorithm
//!
//! Pixels are visited top-to-bottom, left-to-right. For each pixel:
//!
//! 1. Add the accumulated error to each RGB channel and clamp to `[0, 255]`
//! 2. Score the adjusted color with the plane's [`Classifier`]
//! 3. Score below threshold → ink (black, 0), otherwise paper (white, 255)
//! 4. Spread `score - output` to the neighbors with the kernel weights
//!
//! The same error is added to all three channels, so only the classified
//! score diffuses and the result stays neutral.
//!
//! ## Kernels
//!
//! Every kernel is a 3×5 table. Row 0 is the current row, the current pixel
//! sits in column 2 and only the columns to its right are used on that row:
//!
//! ```text
//! Floyd-Steinberg (/16)       Jarvis-Judice-Ninke (/48)
//!   .  .  X  7  .               .  .  X  7  5
//!   .  3  5  1  .               3  5  7  5  3
//!                               1  3  5  3  1
//! ```
//!
//! Weights that land outside the frame are dropped, not renormalized.
//!
//! ## Usage Example
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use paperlink::render::classify::Classifier;
//! use paperlink::render::dither::{self, Kernel};
//!
//! let frame = RgbaImage::from_pixel(16, 4, Rgba([255, 255, 255, 255]));
//! let out = dither::dither(&frame, &Classifier::Grayscale { threshold: 128 }, Kernel::FloydSteinberg);
//! assert!(out.pixels().all(|p| p[0] == 255));
//! ```

use clap::ValueEnum;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::classify::Classifier;

/// Output color of an ink pixel
pub const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Output color of a paper pixel
pub const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Column of the current pixel inside a kernel row
const KERNEL_ORIGIN: usize = 2;

type Weights = [[f64; 5]; 3];

const FLOYD_STEINBERG: Weights = [
    [0.0, 0.0, 0.0, 7.0 / 16.0, 0.0],
    [0.0, 3.0 / 16.0, 5.0 / 16.0, 1.0 / 16.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0],
];

const JARVIS_JUDICE_NINKE: Weights = [
    [0.0, 0.0, 0.0, 7.0 / 48.0, 5.0 / 48.0],
    [3.0 / 48.0, 5.0 / 48.0, 7.0 / 48.0, 5.0 / 48.0, 3.0 / 48.0],
    [1.0 / 48.0, 3.0 / 48.0, 5.0 / 48.0, 3.0 / 48.0, 1.0 / 48.0],
];

const STUCKI: Weights = [
    [0.0, 0.0, 0.0, 8.0 / 42.0, 4.0 / 42.0],
    [2.0 / 42.0, 4.0 / 42.0, 8.0 / 42.0, 4.0 / 42.0, 2.0 / 42.0],
    [1.0 / 42.0, 2.0 / 42.0, 4.0 / 42.0, 2.0 / 42.0, 1.0 / 42.0],
];

// Atkinson spreads only 6/8 of the error.
const ATKINSON: Weights = [
    [0.0, 0.0, 0.0, 1.0 / 8.0, 1.0 / 8.0],
    [0.0, 1.0 / 8.0, 1.0 / 8.0, 1.0 / 8.0, 0.0],
    [0.0, 0.0, 1.0 / 8.0, 0.0, 0.0],
];

const BURKES: Weights = [
    [0.0, 0.0, 0.0, 8.0 / 32.0, 4.0 / 32.0],
    [2.0 / 32.0, 4.0 / 32.0, 8.0 / 32.0, 4.0 / 32.0, 2.0 / 32.0],
    [0.0, 0.0, 0.0, 0.0, 0.0],
];

const SIERRA: Weights = [
    [0.0, 0.0, 0.0, 5.0 / 32.0, 3.0 / 32.0],
    [2.0 / 32.0, 4.0 / 32.0, 5.0 / 32.0, 4.0 / 32.0, 2.0 / 32.0],
    [0.0, 2.0 / 32.0, 3.0 / 32.0, 2.0 / 32.0, 0.0],
];

/// Named error-diffusion kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Kernel {
    #[default]
    FloydSteinberg,
    JarvisJudiceNinke,
    Atkinson,
    Burkes,
    Stucki,
    Sierra,
}

impl Kernel {
    fn weights(self) -> &'static Weights {
        match self {
            Self::FloydSteinberg => &FLOYD_STEINBERG,
            Self::JarvisJudiceNinke => &JARVIS_JUDICE_NINKE,
            Self::Atkinson => &ATKINSON,
            Self::Burkes => &BURKES,
            Self::Stucki => &STUCKI,
            Self::Sierra => &SIERRA,
        }
    }
}

/// Dither `frame` into a black/white image for the plane described by
/// `classifier`.
///
/// Deterministic: identical input, kernel and classifier always produce an
/// identical image.
pub fn dither(frame: &RgbaImage, classifier: &Classifier, kernel: Kernel) -> RgbaImage {
    let (width, height) = frame.dimensions();
    let (w, h) = (width as usize, height as usize);
    let weights = kernel.weights();

    let mut errors = vec![0.0f64; w * h];
    let mut out = RgbaImage::new(width, height);

    for y in 0..h {
        for x in 0..w {
            let pixel = frame.get_pixel(x as u32, y as u32);
            let e = errors[y * w + x];
            let adjust = |c: u8| (f64::from(c) + e).clamp(0.0, 255.0).round() as u8;

            let score = classifier.score(adjust(pixel[0]), adjust(pixel[1]), adjust(pixel[2]));
            let (color, level) = if classifier.is_ink(score) {
                (INK, 0.0)
            } else {
                (PAPER, 255.0)
            };
            out.put_pixel(x as u32, y as u32, color);

            let error = f64::from(score) - level;
            if error == 0.0 {
                continue;
            }

            for (ky, row) in weights.iter().enumerate() {
                let ny = y + ky;
                if ny >= h {
                    break;
                }
                for (kx, &weight) in row.iter().enumerate() {
                    if weight == 0.0 {
                        continue;
                    }
                    let Some(nx) = (x + kx).checked_sub(KERNEL_ORIGIN) else {
                        continue;
                    };
                    if nx >= w {
                        continue;
                    }
                    errors[ny * w + nx] += error * weight;
                }
            }
        }
    }

    out
}

/// Pack a row of boolean pixel values into bytes, MSB first.
///
/// A trailing partial byte is padded with zero bits on the right.
///
/// ```
/// use paperlink::render::dither::pack_row;
///
/// let row = vec![true, true, true, true, false, false, false, false];
/// assert_eq!(pack_row(&row), vec![0xF0]);
///
/// let row = vec![true; 12];
/// assert_eq!(pack_row(&row), vec![0xFF, 0xF0]);
/// ```
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            bytes[i / 8] |= 1 << (7 - (i % 8));
        }
    }

    bytes
}

// ============================================================================
// TESTS
// ============================================================================
