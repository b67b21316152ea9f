//! # Canvas Preparation
//!
//! Turns an arbitrary image file into an RGBA frame of exactly the panel's
//! size, and renders dithered planes back into a color preview.
//!
//! ```text
//! open() ──► fit() ──► align() ──► frame (800×480, opaque)
//! ```
//!
//! `fit()` scales down (or up, with `enlarge`) preserving the aspect ratio
//! and flattens transparency over white. `align()` places the result on a
//! white canvas at one of nine anchors.

use std::path::Path;

use clap::ValueEnum;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::Planes;
use super::planes::{BlendOrder, PixelColor};
use crate::display::DisplayConfig;
use crate::error::PaperlinkError;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);

/// Where the image sits on the canvas when it does not fill it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    TopLeft,
    TopMiddle,
    TopRight,
    MiddleLeft,
    #[default]
    Middle,
    MiddleRight,
    BottomLeft,
    BottomMiddle,
    BottomRight,
}

impl Alignment {
    /// Horizontal/vertical anchor: 0 = start, 1 = middle, 2 = end.
    fn anchors(self) -> (u8, u8) {
        match self {
            Self::TopLeft => (0, 0),
            Self::TopMiddle => (1, 0),
            Self::TopRight => (2, 0),
            Self::MiddleLeft => (0, 1),
            Self::Middle => (1, 1),
            Self::MiddleRight => (2, 1),
            Self::BottomLeft => (0, 2),
            Self::BottomMiddle => (1, 2),
            Self::BottomRight => (2, 2),
        }
    }
}

/// Decode an image file (any format the `image` crate supports).
pub fn open<P: AsRef<Path>>(path: P) -> Result<DynamicImage, PaperlinkError> {
    let path = path.as_ref();
    image::open(path)
        .map_err(|e| PaperlinkError::Image(format!("unable to open {}: {}", path.display(), e)))
}

/// Scale to fit inside `width × height`, preserving the aspect ratio.
///
/// Images that already fit are left at their size unless `enlarge` is set.
/// The result is fully opaque: alpha is blended over white.
pub fn fit(image: &DynamicImage, width: u32, height: u32, enlarge: bool) -> RgbaImage {
    let (w, h) = (image.width().max(1), image.height().max(1));
    let scale = (width as f64 / w as f64).min(height as f64 / h as f64);

    let scaled = if scale > 1.0 && !enlarge {
        image.to_rgba8()
    } else {
        let new_w = ((w as f64 * scale).floor() as u32).max(1);
        let new_h = ((h as f64 * scale).floor() as u32).max(1);
        image
            .resize_exact(new_w, new_h, FilterType::Lanczos3)
            .to_rgba8()
    };

    flatten(scaled)
}

/// Blend every pixel's alpha over a white background.
fn flatten(mut image: RgbaImage) -> RgbaImage {
    for pixel in image.pixels_mut() {
        let alpha = f64::from(pixel[3]) / 255.0;
        for c in 0..3 {
            let v = alpha * f64::from(pixel[c]) + (1.0 - alpha) * 255.0;
            pixel[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        pixel[3] = 255;
    }
    image
}

/// Place `image` on a white `width × height` canvas.
///
/// Parts that do not fit are clipped on the right/bottom.
pub fn align(image: &RgbaImage, width: u32, height: u32, alignment: Alignment) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, WHITE);

    let free_x = width.saturating_sub(image.width());
    let free_y = height.saturating_sub(image.height());
    let offset = |free: u32, anchor: u8| match anchor {
        0 => 0,
        1 => free / 2,
        _ => free,
    };

    let (ax, ay) = alignment.anchors();
    imageops::replace(
        &mut canvas,
        image,
        i64::from(offset(free_x, ax)),
        i64::from(offset(free_y, ay)),
    );
    canvas
}

/// Open, fit and align an image file into a panel frame.
pub fn prepare<P: AsRef<Path>>(
    path: P,
    display: &DisplayConfig,
    alignment: Alignment,
    enlarge: bool,
) -> Result<RgbaImage, PaperlinkError> {
    let image = open(path)?;
    let fitted = fit(&image, display.width, display.height, enlarge);
    Ok(align(&fitted, display.width, display.height, alignment))
}

/// Join dithered planes into one color image, resolving overlaps with
/// `order`.
pub fn preview(planes: &Planes, order: &BlendOrder) -> RgbaImage {
    let (width, height) = planes.black.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let ink = |plane: Option<&RgbaImage>| {
            plane.is_some_and(|p| super::planes::is_ink(p.get_pixel(x, y)))
        };
        match order.resolve(
            ink(Some(&planes.black)),
            ink(planes.red.as_ref()),
            ink(planes.yellow.as_ref()),
        ) {
            PixelColor::Black => BLACK,
            PixelColor::White => WHITE,
            PixelColor::Red => RED,
            PixelColor::Yellow => YELLOW,
        }
    })
}

/// Write an image as PNG (format chosen from the extension).
pub fn save<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<(), PaperlinkError> {
    let path = path.as_ref();
    image
        .save(path)
        .map_err(|e| PaperlinkError::Image(format!("unable to save {}: {}", path.display(), e)))
}

// ============================================================================
// TESTS
// ============================================================================
