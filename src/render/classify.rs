//! # Pixel Classification
//!
//! Maps an RGB pixel to a brightness score in `0..=255` for one ink plane.
//! A score below the plane's threshold means "ink", anything else is paper.
//!
//! ## Variants
//!
//! | Variant | Score |
//! |---------|-------|
//! | Grayscale | `round(0.299R + 0.587G + 0.114B)` |
//! | Red | `255 - round(255 × S)` inside the red hue gate, else 255 |
//! | Yellow | `255 - round(255 × S)` inside the yellow hue gate, else 255 |
//!
//! ## Hue Gate
//!
//! ```text
//!              0°/360°
//!         ╲  red  ╱            accept when the angular distance to the
//!    330° ─╲─────╱─ 30°        target hue is <= hue_width / 2, the
//!           ╲   ╱              saturation is >= min_saturation % and the
//!            ╲ ╱               lightness is <= max_lightness %
//! ```
//!
//! Pure grays (zero chroma) never belong to a color plane.

/// Target hue of the red plane (degrees)
pub const RED_HUE: f64 = 0.0;

/// Target hue of the yellow plane (degrees)
pub const YELLOW_HUE: f64 = 50.0;

/// Score returned for pixels outside a color gate
pub const PAPER: u8 = 255;

/// Gate parameters for a color plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HueGate {
    /// Dithering threshold (score below it is ink)
    pub threshold: u8,
    /// Full width of the accepted hue window, in degrees
    pub hue_width: u16,
    /// Minimum saturation, in percent
    pub min_saturation: u8,
    /// Maximum lightness, in percent
    pub max_lightness: u8,
}

impl HueGate {
    /// Defaults of the red plane.
    pub const RED: Self = Self {
        threshold: 128,
        hue_width: 50,
        min_saturation: 0,
        max_lightness: 80,
    };

    /// Defaults of the yellow plane.
    pub const YELLOW: Self = Self {
        threshold: 128,
        hue_width: 50,
        min_saturation: 0,
        max_lightness: 90,
    };

    fn score(&self, target_hue: f64, r: u8, g: u8, b: u8) -> u8 {
        let Some(hsl) = Hsl::from_rgb(r, g, b) else {
            return PAPER;
        };

        if hue_distance(hsl.h, target_hue) > f64::from(self.hue_width) / 2.0 {
            return PAPER;
        }
        if hsl.s * 100.0 < f64::from(self.min_saturation) {
            return PAPER;
        }
        if hsl.l * 100.0 > f64::from(self.max_lightness) {
            return PAPER;
        }

        255 - (255.0 * hsl.s).round() as u8
    }
}

/// Per-plane pixel classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classifier {
    /// Luminance against a threshold (black plane)
    Grayscale { threshold: u8 },
    /// Red hue gate centered on 0°
    Red(HueGate),
    /// Yellow hue gate centered on 50°
    Yellow(HueGate),
}

impl Classifier {
    /// Brightness score of a pixel for this plane.
    pub fn score(&self, r: u8, g: u8, b: u8) -> u8 {
        match self {
            Self::Grayscale { .. } => luminance(r, g, b),
            Self::Red(gate) => gate.score(RED_HUE, r, g, b),
            Self::Yellow(gate) => gate.score(YELLOW_HUE, r, g, b),
        }
    }

    /// Scores strictly below this value are ink.
    pub fn threshold(&self) -> u8 {
        match self {
            Self::Grayscale { threshold } => *threshold,
            Self::Red(gate) | Self::Yellow(gate) => gate.threshold,
        }
    }

    #[inline]
    pub fn is_ink(&self, score: u8) -> bool {
        score < self.threshold()
    }
}

/// ITU-R BT.601 luma, rounded.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

/// Hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    /// Convert an RGB triple. Returns `None` for achromatic pixels.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Option<Self> {
        let rf = f64::from(r) / 255.0;
        let gf = f64::from(g) / 255.0;
        let bf = f64::from(b) / 255.0;

        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let delta = max - min;
        if delta == 0.0 {
            return None;
        }

        let l = (max + min) / 2.0;
        let s = if l < 0.5 {
            delta / (max + min)
        } else {
            delta / (2.0 - max - min)
        };

        let h = if rf == max {
            (gf - bf) / delta
        } else if gf == max {
            2.0 + (bf - rf) / delta
        } else {
            4.0 + (rf - gf) / delta
        };

        Some(Self {
            h: (h * 60.0).rem_euclid(360.0),
            s,
            l,
        })
    }
}

/// Shortest angular distance between two hues.
#[inline]
fn hue_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

// ============================================================================
// TESTS
// ============================================================================
