//! # Configuration
//!
//! Tuning knobs for the image pipeline and the transfer protocol.
//!
//! Every field has a default, and a JSON file only needs to name the fields
//! it changes. Color planes (`red`, `yellow`) are replaced as a whole:
//!
//! ```json
//! {
//!   "transfer": { "write_pause_ms": 300, "read_device_output": true },
//!   "image": { "black": { "kernel": "stucki" }, "align": "top-left" }
//! }
//! ```
//!
//! ## Usage
//!
//! ```
//! use paperlink::config::Config;
//!
//! let config = Config::from_json(r#"{ "transfer": { "max_attempts": 5 } }"#)?;
//! assert_eq!(config.transfer.max_attempts, 5);
//! assert_eq!(config.transfer.refresh_pause_ms, 5000);
//! # Ok::<(), paperlink::PaperlinkError>(())
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PaperlinkError;
use crate::render::canvas::Alignment;
use crate::render::classify::{Classifier, HueGate};
use crate::render::dither::Kernel;
use crate::render::planes::BlendOrder;

/// Complete configuration of one print run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transfer: TransferConfig,
    pub image: ImageConfig,
}

impl Config {
    /// Load a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PaperlinkError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PaperlinkError::Config(format!("unable to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, PaperlinkError> {
        serde_json::from_str(text).map_err(|e| PaperlinkError::Config(e.to_string()))
    }
}

/// Serial transfer timing and verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Pause after every chunk terminator (ms)
    pub write_pause_ms: u64,
    /// Settle delay between handshake request and response read (ms)
    pub handshake_pause_ms: u64,
    /// Wait for the panel to redraw after the last chunk (ms)
    pub refresh_pause_ms: u64,
    /// Read chunk acknowledgements and the final byte count
    pub read_device_output: bool,
    /// Transmit passes allowed when the device miscounts
    pub max_attempts: u32,
    /// Detached transfer: give up after this long without an outcome (s)
    pub idle_timeout_secs: u64,
    /// Detached transfer: pause after each read before flushing input (ms)
    pub read_pause_ms: u64,
    /// Detached transfer: reader poll interval (ms)
    pub read_poll_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            write_pause_ms: 1000,
            handshake_pause_ms: 1000,
            refresh_pause_ms: 5000,
            read_device_output: false,
            max_attempts: 3,
            idle_timeout_secs: 30,
            read_pause_ms: 50,
            read_poll_ms: 100,
        }
    }
}

impl TransferConfig {
    /// All pauses zeroed; for tests and simulators.
    pub fn immediate() -> Self {
        Self {
            write_pause_ms: 0,
            handshake_pause_ms: 0,
            refresh_pause_ms: 0,
            read_pause_ms: 0,
            read_poll_ms: 5,
            ..Self::default()
        }
    }

    pub fn write_pause(&self) -> Duration {
        Duration::from_millis(self.write_pause_ms)
    }

    pub fn handshake_pause(&self) -> Duration {
        Duration::from_millis(self.handshake_pause_ms)
    }

    pub fn refresh_pause(&self) -> Duration {
        Duration::from_millis(self.refresh_pause_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn read_pause(&self) -> Duration {
        Duration::from_millis(self.read_pause_ms)
    }

    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms.max(1))
    }
}

/// Dithering parameters of the black plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneConfig {
    pub kernel: Kernel,
    pub threshold: u8,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::FloydSteinberg,
            threshold: 128,
        }
    }
}

impl PlaneConfig {
    pub fn classifier(&self) -> Classifier {
        Classifier::Grayscale {
            threshold: self.threshold,
        }
    }
}

/// Dithering and hue gate parameters of a color plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPlaneConfig {
    pub kernel: Kernel,
    pub threshold: u8,
    /// Full hue window width (degrees)
    pub hue_width: u16,
    /// Minimum saturation (%)
    pub min_saturation: u8,
    /// Maximum lightness (%)
    pub max_lightness: u8,
}

impl ColorPlaneConfig {
    pub const RED: Self = Self::with_gate(Kernel::Atkinson, HueGate::RED);
    pub const YELLOW: Self = Self::with_gate(Kernel::FloydSteinberg, HueGate::YELLOW);

    const fn with_gate(kernel: Kernel, gate: HueGate) -> Self {
        Self {
            kernel,
            threshold: gate.threshold,
            hue_width: gate.hue_width,
            min_saturation: gate.min_saturation,
            max_lightness: gate.max_lightness,
        }
    }

    pub fn gate(&self) -> HueGate {
        HueGate {
            threshold: self.threshold,
            hue_width: self.hue_width,
            min_saturation: self.min_saturation,
            max_lightness: self.max_lightness,
        }
    }
}

/// Image preparation and plane separation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub black: PlaneConfig,
    pub red: ColorPlaneConfig,
    pub yellow: ColorPlaneConfig,
    pub blend_order: BlendOrder,
    pub align: Alignment,
    /// Scale small images up to fill the frame
    pub enlarge: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            black: PlaneConfig::default(),
            red: ColorPlaneConfig::RED,
            yellow: ColorPlaneConfig::YELLOW,
            blend_order: BlendOrder::default(),
            align: Alignment::default(),
            enlarge: false,
        }
    }
}

impl ImageConfig {
    pub fn red_classifier(&self) -> Classifier {
        Classifier::Red(self.red.gate())
    }

    pub fn yellow_classifier(&self) -> Classifier {
        Classifier::Yellow(self.yellow.gate())
    }
}

// ============================================================================
// TESTS
// ============================================================================
