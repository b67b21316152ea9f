//! # Detached Transfer
//!
//! Event-driven variant of the transfer for links where request/response
//! framing is unreliable. A background reader watches everything the panel
//! sends; the first frame that looks like a handshake response starts the
//! transmit task.
//!
//! ```text
//!  caller                     reader (blocking)              transmit (blocking)
//!  ──────                     ─────────────────              ───────────────────
//!  spawn reader ───────────►  loop {
//!  reset output                 read (poll)
//!  write request                pause, reset input
//!  select! {                    valid response? ──── once ─► chunks + CR LF
//!    success  ◄─────────────────────────────────────────────  drain, refresh
//!    error    ◄──────────── read/reset failure  ◄───────────  write failure
//!    idle timeout             }
//!  }
//!  stop + join both
//! ```
//!
//! There is no retry: the first of success, error or idle timeout is the
//! outcome. The reader keeps reading while the transmit task writes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::{READ_BUFFER, await_refresh, pause, transport, write_chunk};
use super::{chunk, handshake};
use crate::config::TransferConfig;
use crate::display::DisplayConfig;
use crate::error::PaperlinkError;
use crate::render::planes::PrintJob;
use crate::transport::{SerialLink, SerialPort};

/// Single-fire outcome channels shared by the reader and transmit tasks.
#[derive(Clone)]
struct Signals {
    success: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    error: Arc<Mutex<Option<oneshot::Sender<PaperlinkError>>>>,
}

impl Signals {
    fn new() -> (Self, oneshot::Receiver<()>, oneshot::Receiver<PaperlinkError>) {
        let (success_tx, success_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        let signals = Self {
            success: Arc::new(Mutex::new(Some(success_tx))),
            error: Arc::new(Mutex::new(Some(error_tx))),
        };
        (signals, success_rx, error_rx)
    }

    fn succeed(&self) {
        if let Some(tx) = self.success.lock().ok().and_then(|mut tx| tx.take()) {
            let _ = tx.send(());
        }
    }

    fn fail(&self, err: PaperlinkError) {
        match self.error.lock().ok().and_then(|mut tx| tx.take()) {
            Some(tx) => {
                let _ = tx.send(err);
            }
            None => warn!("dropping late transfer error: {}", err),
        }
    }
}

/// Shared state of the background tasks.
struct Worker {
    config: TransferConfig,
    payload: Arc<[u8]>,
    signals: Signals,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Read until stopped. Returns the transmit task if it was started.
    fn read_loop(
        self: Arc<Self>,
        mut link: Box<dyn SerialLink>,
        mut transmit_link: Option<Box<dyn SerialLink>>,
        runtime: Handle,
    ) -> Option<JoinHandle<()>> {
        let mut transmit = None;
        let mut buf = [0u8; READ_BUFFER];

        while !self.stopped() {
            let n = match link.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => n,
                Err(e) => {
                    self.signals.fail(transport("unable to read data", e));
                    break;
                }
            };
            debug!(count = n, data = %handshake::printable(&buf[..n]), "read");

            pause(self.config.read_pause());
            if let Err(e) = link.reset_input() {
                self.signals.fail(transport("unable to reset input buffer", e));
                break;
            }

            match handshake::validate_response(&buf[..n]) {
                Ok(()) => {
                    if let Some(tx_link) = transmit_link.take() {
                        info!("handshake ok");
                        let worker = Arc::clone(&self);
                        transmit = Some(runtime.spawn_blocking(move || worker.transmit(tx_link)));
                    }
                }
                Err(reason) => debug!("not a handshake response: {}", reason),
            }
        }

        transmit
    }

    fn transmit(&self, mut link: Box<dyn SerialLink>) {
        match self.send_payload(&mut link) {
            Ok(true) => self.signals.succeed(),
            Ok(false) => debug!("transmit stopped"),
            Err(e) => self.signals.fail(e),
        }
    }

    /// `Ok(false)` when stopped before the last chunk.
    fn send_payload(&self, link: &mut Box<dyn SerialLink>) -> Result<bool, PaperlinkError> {
        for (idx, data) in chunk::chunks(&self.payload) {
            if self.stopped() {
                return Ok(false);
            }
            write_chunk(link, idx, data)?;
            pause(self.config.write_pause());
        }
        await_refresh(link, &self.config)?;
        Ok(true)
    }
}

/// # Detached Session
///
/// ## Example
///
/// ```
/// use paperlink::config::TransferConfig;
/// use paperlink::display::DisplayConfig;
/// use paperlink::protocol::detached::DetachedSession;
/// use paperlink::render::planes::PrintJob;
/// use paperlink::transport::MockLink;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), paperlink::PaperlinkError> {
/// let display = DisplayConfig::IL075;
/// let job = PrintJob::bw(&display, vec![0xFF; display.plane_len()])?;
///
/// DetachedSession::new(MockLink::panel(), display, TransferConfig::immediate())
///     .run(&job)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DetachedSession<L: SerialLink> {
    link: L,
    display: DisplayConfig,
    config: TransferConfig,
}

impl DetachedSession<SerialPort> {
    pub fn open<P: AsRef<Path>>(
        device: P,
        display: DisplayConfig,
        config: TransferConfig,
    ) -> Result<Self, PaperlinkError> {
        let port = SerialPort::open(device)?;
        Ok(Self::new(port, display, config))
    }
}

impl<L: SerialLink> DetachedSession<L> {
    pub fn new(link: L, display: DisplayConfig, config: TransferConfig) -> Self {
        Self {
            link,
            display,
            config,
        }
    }

    /// Send the job and wait for success, error or the idle timeout.
    pub async fn run(mut self, job: &PrintJob) -> Result<(), PaperlinkError> {
        self.link
            .set_rts(true)
            .map_err(|e| transport("unable to set RTS", e))?;
        self.link
            .set_read_timeout(None)
            .map_err(|e| transport("unable to reset read timeout", e))?;

        let mut reader_link = self
            .link
            .try_clone()
            .map_err(|e| transport("unable to clone port", e))?;
        reader_link
            .set_read_timeout(Some(self.config.read_poll()))
            .map_err(|e| transport("unable to set read timeout", e))?;
        let transmit_link = self
            .link
            .try_clone()
            .map_err(|e| transport("unable to clone port", e))?;

        let (signals, success_rx, error_rx) = Signals::new();
        let worker = Arc::new(Worker {
            config: self.config.clone(),
            payload: Arc::from(job.payload()),
            signals,
            stop: Arc::new(AtomicBool::new(false)),
        });
        let stop = Arc::clone(&worker.stop);

        let runtime = Handle::current();
        let reader = tokio::task::spawn_blocking({
            let worker = Arc::clone(&worker);
            move || worker.read_loop(reader_link, Some(transmit_link), runtime)
        });

        let outcome = match self.send_request(job) {
            Ok(()) => {
                let idle = self.config.idle_timeout();
                tokio::select! {
                    Ok(()) = success_rx => Ok(()),
                    Ok(err) = error_rx => Err(err),
                    _ = tokio::time::sleep(idle) => Err(PaperlinkError::Timeout(idle)),
                }
            }
            Err(e) => Err(e),
        };

        stop.store(true, Ordering::SeqCst);
        match reader.await {
            Ok(Some(transmit)) => {
                if let Err(e) = transmit.await {
                    warn!("transmit task failed: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("reader task failed: {}", e),
        }

        outcome
    }

    fn send_request(&mut self, job: &PrintJob) -> Result<(), PaperlinkError> {
        debug!("reset output buffer");
        self.link
            .reset_output()
            .map_err(|e| transport("unable to reset output buffer", e))?;

        debug!(mode = %job.mode(), "send handshake request");
        self.link
            .write_all(&handshake::request(&self.display, job.mode()))
            .map_err(|e| transport("unable to send handshake request", e))
    }
}

/// Print a job with the detached transfer.
pub async fn print_detached<P: AsRef<Path>>(
    device: P,
    job: &PrintJob,
    config: &TransferConfig,
) -> Result<(), PaperlinkError> {
    DetachedSession::open(device, DisplayConfig::default(), config.clone())?
        .run(job)
        .await
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Fault, LinkEvent, MockLink};
    use std::time::Duration;

    fn bw_job() -> PrintJob {
        let display = DisplayConfig::IL075;
        PrintJob::bw(&display, vec![0xFF; display.plane_len()]).unwrap()
    }

    fn session(link: &MockLink, config: TransferConfig) -> DetachedSession<MockLink> {
        DetachedSession::new(link.clone(), DisplayConfig::IL075, config)
    }

    fn short_timeout() -> TransferConfig {
        TransferConfig {
            idle_timeout_secs: 1,
            ..TransferConfig::immediate()
        }
    }

    #[tokio::test]
    async fn test_success_sends_every_chunk() {
        let link = MockLink::panel();
        let job = bw_job();
        session(&link, TransferConfig::immediate()).run(&job).await.unwrap();

        let writes = link.writes();
        assert_eq!(writes.len(), 1 + 24);
        let payload: Vec<u8> = writes[1..].iter().step_by(2).flatten().copied().collect();
        assert_eq!(payload, job.payload());

        let events = link.events();
        assert_eq!(events[0], LinkEvent::Rts(true));
        assert_eq!(events[1], LinkEvent::ResetOutput);
        assert!(events.contains(&LinkEvent::Drain));
        // reader flushed input after the handshake response
        assert!(events.contains(&LinkEvent::ResetInput));
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let link = MockLink::new();
        let err = session(&link, short_timeout()).run(&bw_job()).await.unwrap_err();

        assert!(matches!(err, PaperlinkError::Timeout(d) if d == Duration::from_secs(1)));
        assert_eq!(link.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_response_is_ignored() {
        let link = MockLink::new();
        let mut bad = handshake::response();
        bad[0] = 0x00;
        link.reply_on_write(&handshake::REQUEST_MAGIC, vec![bad.to_vec()]);

        let err = session(&link, short_timeout()).run(&bw_job()).await.unwrap_err();
        assert!(matches!(err, PaperlinkError::Timeout(_)));
        assert_eq!(link.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_chunk_write_error_is_reported() {
        let link = MockLink::panel();
        // write 0 = request, 1 = chunk #0
        link.fail(Fault::Write(1));

        let err = session(&link, short_timeout()).run(&bw_job()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transport error: unable to write chunk #0: injected Write(1) fault"
        );
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let link = MockLink::panel();
        link.fail(Fault::Read);

        let err = session(&link, short_timeout()).run(&bw_job()).await.unwrap_err();
        assert!(err.to_string().contains("unable to read data"));
    }

    #[tokio::test]
    async fn test_request_failure_stops_reader() {
        let link = MockLink::panel();
        link.fail(Fault::ResetOutput);

        let err = session(&link, short_timeout()).run(&bw_job()).await.unwrap_err();
        assert!(err.to_string().contains("unable to reset output buffer"));
        assert!(link.writes().is_empty());
    }

    #[tokio::test]
    async fn test_transmit_starts_once() {
        let link = MockLink::panel();
        // The panel repeats its response after the first chunk
        link.reply_on_write(&chunk::CRLF, vec![handshake::response().to_vec()]);

        session(&link, TransferConfig::immediate())
            .run(&bw_job())
            .await
            .unwrap();
        assert_eq!(link.writes().len(), 1 + 24);
    }
}
