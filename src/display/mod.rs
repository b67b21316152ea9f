//! # Display Module
//!
//! This module describes the e-ink panel this crate drives.
//!
//! ## Modules
//!
//! - [`config`]: Panel geometry, model id and color modes

pub mod config;

pub use config::{ColorMode, DisplayConfig};
