//! # Rendering Module
//!
//! This module turns a raster image into the byte planes the panel accepts.
//!
//! ## Modules
//!
//! - [`canvas`]: Open, fit and align images; color previews
//! - [`classify`]: Per-plane pixel scoring (grayscale, red, yellow)
//! - [`dither`]: Error-diffusion dithering kernels
//! - [`planes`]: Bit packing, escaping and print jobs
//!
//! ## Pipeline
//!
//! ```text
//! frame ─┬─ dither(Grayscale) ─► black ─┐
//!        ├─ dither(Red)       ─► red   ─┼─► encode / encode_combined ─► PrintJob
//!        └─ dither(Yellow)    ─► yellow ┘
//! ```
//!
//! ## Usage Example
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use paperlink::config::ImageConfig;
//! use paperlink::display::{ColorMode, DisplayConfig};
//! use paperlink::render;
//!
//! let display = DisplayConfig::IL075;
//! let frame = RgbaImage::from_pixel(display.width, display.height, Rgba([255, 255, 255, 255]));
//!
//! let planes = render::separate(&frame, ColorMode::Bw, &ImageConfig::default());
//! let job = planes.into_job(&display, ColorMode::Bw, &ImageConfig::default().blend_order)?;
//!
//! assert_eq!(job.len(), 48_000);
//! assert!(job.payload().iter().all(|&b| b == 0xFF));
//! # Ok::<(), paperlink::PaperlinkError>(())
//! ```

pub mod canvas;
pub mod classify;
pub mod dither;
pub mod planes;

use image::RgbaImage;

use crate::config::ImageConfig;
use crate::display::{ColorMode, DisplayConfig};
use crate::error::PaperlinkError;
use planes::{BlendOrder, PrintJob};

/// Dithered black/white images, one per ink plane of the color mode.
#[derive(Debug, Clone)]
pub struct Planes {
    pub black: RgbaImage,
    pub red: Option<RgbaImage>,
    pub yellow: Option<RgbaImage>,
}

/// Dither `frame` into the planes `mode` needs.
///
/// Color planes are dithered in parallel with the black plane.
pub fn separate(frame: &RgbaImage, mode: ColorMode, config: &ImageConfig) -> Planes {
    let black = || dither::dither(frame, &config.black.classifier(), config.black.kernel);
    let red = || {
        matches!(mode, ColorMode::Bwr | ColorMode::Bwry)
            .then(|| dither::dither(frame, &config.red_classifier(), config.red.kernel))
    };
    let yellow = || {
        matches!(mode, ColorMode::Bwry)
            .then(|| dither::dither(frame, &config.yellow_classifier(), config.yellow.kernel))
    };

    let (black, (red, yellow)) = rayon::join(black, || rayon::join(red, yellow));
    Planes { black, red, yellow }
}

impl Planes {
    /// Pack and escape the planes into a job for `mode`.
    pub fn into_job(
        &self,
        display: &DisplayConfig,
        mode: ColorMode,
        order: &BlendOrder,
    ) -> Result<PrintJob, PaperlinkError> {
        if self.black.dimensions() != (display.width, display.height) {
            return Err(PaperlinkError::Validation(format!(
                "frame is {:?}, display needs {}x{}",
                self.black.dimensions(),
                display.width,
                display.height
            )));
        }

        match mode {
            ColorMode::Bw => PrintJob::bw(display, planes::encode(&self.black)),
            ColorMode::Bwr => {
                let red = self.plane(&self.red, "red")?;
                PrintJob::bwr(display, planes::encode(&self.black), planes::encode(red))
            }
            ColorMode::Bwry => {
                let red = self.plane(&self.red, "red")?;
                let yellow = self.plane(&self.yellow, "yellow")?;
                let combined = planes::encode_combined(&self.black, red, yellow, order)?;
                PrintJob::bwry(display, combined)
            }
        }
    }

    fn plane<'a>(
        &self,
        plane: &'a Option<RgbaImage>,
        name: &str,
    ) -> Result<&'a RgbaImage, PaperlinkError> {
        plane
            .as_ref()
            .ok_or_else(|| PaperlinkError::Validation(format!("{} plane was not dithered", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame(color: [u8; 3]) -> RgbaImage {
        let display = DisplayConfig::IL075;
        RgbaImage::from_pixel(
            display.width,
            display.height,
            Rgba([color[0], color[1], color[2], 255]),
        )
    }

    #[test]
    fn test_separate_only_needed_planes() {
        let config = ImageConfig::default();
        let f = frame([255, 255, 255]);

        let bw = separate(&f, ColorMode::Bw, &config);
        assert!(bw.red.is_none() && bw.yellow.is_none());

        let bwr = separate(&f, ColorMode::Bwr, &config);
        assert!(bwr.red.is_some() && bwr.yellow.is_none());

        let bwry = separate(&f, ColorMode::Bwry, &config);
        assert!(bwry.red.is_some() && bwry.yellow.is_some());
    }

    #[test]
    fn test_white_frame_bw_job() {
        let config = ImageConfig::default();
        let display = DisplayConfig::IL075;
        let job = separate(&frame([255, 255, 255]), ColorMode::Bw, &config)
            .into_job(&display, ColorMode::Bw, &config.blend_order)
            .unwrap();
        assert_eq!(job.len(), 48_000);
        assert!(job.payload().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_red_frame_bwry_job() {
        let config = ImageConfig::default();
        let display = DisplayConfig::IL075;
        // Luminance of pure red is 76, so the black plane claims it too.
        let job = separate(&frame([255, 0, 0]), ColorMode::Bwry, &config)
            .into_job(&display, ColorMode::Bwry, &config.blend_order)
            .unwrap();
        assert_eq!(job.len(), 96_000);
        assert!(job.payload().iter().all(|&b| b == 0xFF));

        // Black first: dithered black pixels take over part of the frame
        let order = "black,red,yellow".parse::<BlendOrder>().unwrap();
        let job = separate(&frame([255, 0, 0]), ColorMode::Bwry, &config)
            .into_job(&display, ColorMode::Bwry, &order)
            .unwrap();
        assert_eq!(job.payload()[0] >> 6, 0b00);
        assert!(job.payload().iter().any(|&b| b != 0xFF));
    }

    #[test]
    fn test_missing_plane_is_rejected() {
        let config = ImageConfig::default();
        let display = DisplayConfig::IL075;
        let planes = separate(&frame([255, 255, 255]), ColorMode::Bw, &config);
        let err = planes
            .into_job(&display, ColorMode::Bwr, &config.blend_order)
            .unwrap_err();
        assert!(matches!(err, PaperlinkError::Validation(_)));
    }

    #[test]
    fn test_wrong_frame_size_is_rejected() {
        let config = ImageConfig::default();
        let planes = separate(
            &RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])),
            ColorMode::Bw,
            &config,
        );
        assert!(planes
            .into_job(&DisplayConfig::IL075, ColorMode::Bw, &config.blend_order)
            .is_err());
    }
}
