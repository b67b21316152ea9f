//! # Panel Transfer Protocol
//!
//! Byte-level protocol between the host and the e-ink panel controller.
//!
//! ## Module Structure
//!
//! - [`handshake`]: 12-byte request and 10-byte response frames
//! - [`chunk`]: 4096-byte chunking with CR LF terminators
//! - [`status`]: `label=count` device status lines
//! - [`session`]: Synchronous transfer state machine with bounded retry
//! - [`detached`]: Background-reader variant with an idle timeout
//!
//! ## Wire Sequence
//!
//! ```text
//! host                                   panel
//!  │── AA 55 E1 .. FF 0D 0A ────────────►│
//!  │◄──────────────── A0 50 F1 .. sum FF ─│
//!  │── chunk #0 (4096) 0D 0A ───────────►│   pause
//!  │── ...                               │
//!  │── chunk #n (rest) 0D 0A ───────────►│   drain, refresh pause
//!  │◄──────────────────── bytes=48000 ───│   (optional)
//! ```

pub mod chunk;
pub mod detached;
pub mod handshake;
pub mod session;
pub mod status;

pub use detached::{DetachedSession, print_detached};
pub use session::{TransferSession, TransferState, print};
