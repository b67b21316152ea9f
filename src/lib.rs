//! # Paperlink - E-Ink Panel Driver Library
//!
//! Paperlink prints raster images on 800×480 serial e-ink panels. It
//! provides:
//!
//! - **Image preparation**: fit, align and flatten any image to the panel
//! - **Dithering**: error-diffusion kernels per ink plane (black, red, yellow)
//! - **Plane encoding**: 1-bit and combined 2-bit planes, CR escaping
//! - **Protocol**: handshake, chunked transfer, verification with retry
//! - **Transport**: raw termios serial port, scripted mock link
//!
//! ## Quick Start
//!
//! ```no_run
//! use paperlink::{
//!     config::Config,
//!     display::{ColorMode, DisplayConfig},
//!     protocol,
//!     render::{self, canvas},
//! };
//!
//! let config = Config::default();
//! let display = DisplayConfig::IL075;
//!
//! // Fit the image onto an 800x480 white canvas
//! let frame = canvas::prepare("photo.png", &display, config.image.align, config.image.enlarge)?;
//!
//! // Dither into black and red planes, pack and escape them
//! let planes = render::separate(&frame, ColorMode::Bwr, &config.image);
//! let job = planes.into_job(&display, ColorMode::Bwr, &config.image.blend_order)?;
//!
//! // Handshake, send, wait for the refresh
//! protocol::print("/dev/ttyACM0", &job, &config.transfer)?;
//!
//! # Ok::<(), paperlink::PaperlinkError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`display`] | Panel geometry and color modes |
//! | [`render`] | Canvas, classification, dithering, plane encoding |
//! | [`protocol`] | Handshake frames, chunking, transfer sessions |
//! | [`transport`] | Serial link trait, serial port, mock link |
//! | [`config`] | Transfer and image settings |
//! | [`logging`] | Subscriber setup for the CLI |
//! | [`error`] | Error types |
//!
//! ## Supported Panels
//!
//! Currently tested with:
//! - 7.5" 800×480 panel, model id `0xC4` (BW, BWR and BWRY firmware)

pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod render;
pub mod transport;

// Re-exports for convenience
pub use display::{ColorMode, DisplayConfig};
pub use error::PaperlinkError;
pub use render::planes::PrintJob;
pub use transport::{MockLink, SerialLink, SerialPort};
