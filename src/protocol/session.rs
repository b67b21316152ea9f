//! # Synchronous Transfer Session
//!
//! Drives one print job over an exclusively owned [`SerialLink`].
//!
//! ## States
//!
//! ```text
//! Idle ─► PortOpened ─► Handshaking ─► Transmitting ─► AwaitingRefresh ─► Verified
//!                            │              ▲  │              │
//!                            │              │  │              │ count mismatch
//!                            │              └──┼──────────────┘ (attempt < max)
//!                            ▼                 ▼
//!                          Failed ◄──────── any error
//! ```
//!
//! | State | Work |
//! |-------|------|
//! | PortOpened | Assert RTS, blocking reads |
//! | Handshaking | Write the request, settle, read and validate the response |
//! | Transmitting | 4096-byte chunks + CR LF, optional echo reads, write pause |
//! | AwaitingRefresh | Drain, wait for the panel redraw |
//! | Verified | Optional `label=count` check, reset both buffers |
//!
//! Only a byte count mismatch is retried, by running Transmitting again on the
//! same session. Every other error is fatal and leaves the session in
//! `Failed`.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{chunk, handshake, status};
use crate::config::TransferConfig;
use crate::display::{ColorMode, DisplayConfig};
use crate::error::PaperlinkError;
use crate::render::planes::PrintJob;
use crate::transport::{SerialLink, SerialPort};

/// Maximum bytes taken from the link per read
pub const READ_BUFFER: usize = 1024;

/// Where a session is in the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    PortOpened,
    Handshaking,
    Transmitting,
    AwaitingRefresh,
    Verified,
    Failed,
}

/// # Transfer Session
///
/// ## Example
///
/// ```
/// use paperlink::config::TransferConfig;
/// use paperlink::display::DisplayConfig;
/// use paperlink::protocol::session::{TransferSession, TransferState};
/// use paperlink::render::planes::PrintJob;
/// use paperlink::transport::MockLink;
///
/// let display = DisplayConfig::IL075;
/// let job = PrintJob::bw(&display, vec![0xFF; display.plane_len()])?;
///
/// let mut session = TransferSession::new(MockLink::panel(), display, TransferConfig::immediate());
/// session.run(&job)?;
/// assert_eq!(session.state(), TransferState::Verified);
/// # Ok::<(), paperlink::PaperlinkError>(())
/// ```
pub struct TransferSession<L: SerialLink> {
    link: L,
    display: DisplayConfig,
    config: TransferConfig,
    state: TransferState,
    /// Chunks fully written in the current pass
    chunk_offset: usize,
    /// Transmit passes started
    attempt: u32,
    last_error: Option<String>,
}

impl TransferSession<SerialPort> {
    /// Open `device` and wrap it in a session.
    pub fn open<P: AsRef<Path>>(
        device: P,
        display: DisplayConfig,
        config: TransferConfig,
    ) -> Result<Self, PaperlinkError> {
        debug!(device = %device.as_ref().display(), "open port");
        let port = SerialPort::open(device)?;
        Ok(Self::new(port, display, config))
    }
}

impl<L: SerialLink> TransferSession<L> {
    pub fn new(link: L, display: DisplayConfig, config: TransferConfig) -> Self {
        Self {
            link,
            display,
            config,
            state: TransferState::Idle,
            chunk_offset: 0,
            attempt: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn chunk_offset(&self) -> usize {
        self.chunk_offset
    }

    /// Message of the most recent failure, retried or not.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Give the link back, e.g. to inspect a mock.
    pub fn into_link(self) -> L {
        self.link
    }

    /// Run the whole job: prepare the port, handshake, transmit and verify.
    pub fn run(&mut self, job: &PrintJob) -> Result<(), PaperlinkError> {
        let result = self.run_job(job);
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
            self.enter(TransferState::Failed);
        }
        result
    }

    fn run_job(&mut self, job: &PrintJob) -> Result<(), PaperlinkError> {
        self.prepare()?;

        debug!(mode = %job.mode(), "handshake");
        self.handshake(job.mode())
            .map_err(|e| context("unable to handshake", e))?;
        info!("handshake ok");

        let max_attempts = self.config.max_attempts.max(1);
        loop {
            self.attempt += 1;
            match self.transmit(job.payload()) {
                Ok(()) => {
                    self.enter(TransferState::Verified);
                    return Ok(());
                }
                Err(e) if e.is_retryable() && self.attempt < max_attempts => {
                    warn!(attempt = self.attempt, max_attempts, "{}, retrying", e);
                    self.last_error = Some(e.to_string());
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt = self.attempt, "{}", e);
                    return Err(PaperlinkError::RetriesExhausted {
                        attempts: self.attempt,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Assert RTS and switch to blocking reads.
    fn prepare(&mut self) -> Result<(), PaperlinkError> {
        debug!("set port RTS");
        self.link
            .set_rts(true)
            .map_err(|e| transport("unable to set RTS", e))?;

        debug!("set port read timeout to unlimited");
        self.link
            .set_read_timeout(None)
            .map_err(|e| transport("unable to set read timeout", e))?;

        self.enter(TransferState::PortOpened);
        Ok(())
    }

    fn handshake(&mut self, mode: ColorMode) -> Result<(), PaperlinkError> {
        self.enter(TransferState::Handshaking);

        debug!("send handshake request");
        self.link
            .write_all(&handshake::request(&self.display, mode))
            .map_err(|e| transport("unable to send handshake request", e))?;

        pause(self.config.handshake_pause());

        debug!("read handshake response");
        let response = self
            .read_device()
            .map_err(|e| transport("unable to read handshake response", e))?;
        debug!(response = %handshake::printable(&response), "handshake response");

        handshake::validate_response(&response).map_err(|reason| PaperlinkError::Handshake {
            op: "unable to validate handshake response".into(),
            reason,
        })
    }

    /// One transmit pass: chunks, refresh wait, optional verification and
    /// the buffer reset.
    fn transmit(&mut self, payload: &[u8]) -> Result<(), PaperlinkError> {
        self.enter(TransferState::Transmitting);
        self.chunk_offset = 0;
        info!(
            attempt = self.attempt,
            chunks = chunk::chunk_count(payload.len()),
            "sending payload"
        );

        for (idx, data) in chunk::chunks(payload) {
            write_chunk(&mut self.link, idx, data)?;

            if self.config.read_device_output {
                for line in 1..=2 {
                    debug!(chunk = idx, line, "read data after chunk");
                    self.read_device().map_err(|e| {
                        transport(&format!("unable to read data after chunk #{}", idx), e)
                    })?;
                }
            }

            pause(self.config.write_pause());
            self.chunk_offset = idx + 1;
        }

        self.enter(TransferState::AwaitingRefresh);
        await_refresh(&mut self.link, &self.config)?;

        let verified = if self.config.read_device_output {
            self.verify(payload.len())
        } else {
            Ok(())
        };

        reset_buffers(&mut self.link)?;
        verified
    }

    fn verify(&mut self, expected: usize) -> Result<(), PaperlinkError> {
        debug!("read remaining data");
        let remaining = self
            .read_device()
            .map_err(|e| transport("unable to read device status", e))?;
        status::verify_count(&remaining, expected)?;
        debug!(bytes = expected, "device byte count verified");
        Ok(())
    }

    fn read_device(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = [0u8; READ_BUFFER];
        let n = self.link.read(&mut buf)?;
        debug!(count = n, data = %handshake::printable(&buf[..n]), "read");
        Ok(buf[..n].to_vec())
    }

    fn enter(&mut self, state: TransferState) {
        debug!(from = ?self.state, to = ?state, "transfer state");
        self.state = state;
    }
}

/// Print a job on the panel at `device`.
///
/// Opens the port, runs one [`TransferSession`] and closes the port again.
pub fn print<P: AsRef<Path>>(
    device: P,
    job: &PrintJob,
    config: &TransferConfig,
) -> Result<(), PaperlinkError> {
    let mut session = TransferSession::open(device, DisplayConfig::default(), config.clone())?;
    session.run(job)
}

// ============================================================================
// SHARED STEPS
// ============================================================================

/// Write one chunk and its CR LF terminator.
pub(crate) fn write_chunk<L: SerialLink>(
    link: &mut L,
    idx: usize,
    data: &[u8],
) -> Result<(), PaperlinkError> {
    debug!(chunk = idx, bytes = data.len(), "write chunk");
    link.write_all(data)
        .map_err(|e| transport(&format!("unable to write chunk #{}", idx), e))?;
    link.write_all(&chunk::CRLF)
        .map_err(|e| transport(&format!("unable to write CRLF after chunk #{}", idx), e))
}

/// Drain the output buffer and wait for the panel to redraw.
pub(crate) fn await_refresh<L: SerialLink>(
    link: &mut L,
    config: &TransferConfig,
) -> Result<(), PaperlinkError> {
    debug!("draining output buffer");
    link.drain()
        .map_err(|e| transport("unable to drain output buffer", e))?;

    info!("waiting for screen to refresh");
    pause(config.refresh_pause());
    Ok(())
}

fn reset_buffers<L: SerialLink>(link: &mut L) -> Result<(), PaperlinkError> {
    debug!("reset input buffer");
    link.reset_input()
        .map_err(|e| transport("unable to reset input buffer", e))?;
    debug!("reset output buffer");
    link.reset_output()
        .map_err(|e| transport("unable to reset output buffer", e))
}

pub(crate) fn transport(op: &str, e: std::io::Error) -> PaperlinkError {
    PaperlinkError::Transport(format!("{}: {}", op, e))
}

/// Prefix transport and handshake errors with the step that failed.
fn context(op: &str, e: PaperlinkError) -> PaperlinkError {
    match e {
        PaperlinkError::Transport(msg) => PaperlinkError::Transport(format!("{}: {}", op, msg)),
        PaperlinkError::Handshake { op: inner, reason } => PaperlinkError::Handshake {
            op: format!("{}: {}", op, inner),
            reason,
        },
        other => other,
    }
}

pub(crate) fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

// ============================================================================
// TESTS
// ============================================================================
