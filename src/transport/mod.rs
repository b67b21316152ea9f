//! # Serial Transport Layer
//!
//! This module provides the byte pipe between the transfer protocol and the
//! panel controller.
//!
//! ## Available Transports
//!
//! - [`serial`]: Raw termios serial port (115200 8N1, RTS asserted)
//! - [`mock`]: Scripted in-memory link for tests and dry runs
//!
//! Both implement [`SerialLink`], so the protocol code never touches a file
//! descriptor directly. Link methods return plain [`std::io::Result`]; the
//! protocol layer wraps failures with the operation that produced them.

pub mod mock;
pub mod serial;

use std::io;
use std::time::Duration;

pub use mock::{Fault, LinkEvent, MockLink};
pub use serial::{PortInfo, SerialPort, list_ports};

/// Baud rate of the panel controller
pub const BAUD_RATE: u32 = 115_200;

/// A bidirectional serial connection to the panel.
pub trait SerialLink: Send {
    /// Write every byte of `data`.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read whatever is available into `buf`.
    ///
    /// Blocks until at least one byte arrives, unless a read timeout is set,
    /// in which case `Ok(0)` means the timeout elapsed.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Block until all written bytes have left the output buffer.
    fn drain(&mut self) -> io::Result<()>;

    /// Discard received bytes not read yet.
    fn reset_input(&mut self) -> io::Result<()>;

    /// Discard written bytes not transmitted yet.
    fn reset_output(&mut self) -> io::Result<()>;

    fn set_rts(&mut self, on: bool) -> io::Result<()>;

    /// `None` restores blocking reads.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Second handle to the same connection, with its own read timeout.
    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>>;
}

impl SerialLink for Box<dyn SerialLink> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn drain(&mut self) -> io::Result<()> {
        (**self).drain()
    }

    fn reset_input(&mut self) -> io::Result<()> {
        (**self).reset_input()
    }

    fn reset_output(&mut self) -> io::Result<()> {
        (**self).reset_output()
    }

    fn set_rts(&mut self, on: bool) -> io::Result<()> {
        (**self).set_rts(on)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        (**self).try_clone()
    }
}
