//! # Mock Transport
//!
//! In-memory [`SerialLink`] that records every operation and replays
//! scripted device output. Clones share the same state, so a test keeps one
//! handle for assertions while the protocol owns the other.
//!
//! ## Scripting
//!
//! | Call | Effect |
//! |------|--------|
//! | [`MockLink::push_read`] | Queue bytes for the next read |
//! | [`MockLink::reply_on_write`] | Every write starting with a prefix queues replies |
//! | [`MockLink::reply_on_drain`] | The next drain queues one reply (FIFO) |
//! | [`MockLink::fail`] | Make one operation return an I/O error |
//!
//! [`MockLink::panel()`] answers handshake requests like a healthy panel.
//!
//! Reads with nothing queued sleep for the read timeout and return `Ok(0)`;
//! in blocking mode they fail with `WouldBlock` instead of hanging.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::SerialLink;
use crate::protocol::handshake;

/// One recorded link operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Write(Vec<u8>),
    Read(Vec<u8>),
    Drain,
    ResetInput,
    ResetOutput,
    Rts(bool),
}

/// An operation that should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The n-th write (0-based) fails
    Write(usize),
    /// Every read fails
    Read,
    Drain,
    ResetInput,
    ResetOutput,
}

#[derive(Default)]
struct MockState {
    events: Vec<LinkEvent>,
    reads: VecDeque<Vec<u8>>,
    write_replies: Vec<(Vec<u8>, Vec<Vec<u8>>)>,
    drain_replies: VecDeque<Vec<u8>>,
    faults: Vec<Fault>,
    writes: usize,
}

/// Scripted in-memory serial link.
#[derive(Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
    read_timeout: Option<Duration>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A link that answers every handshake request with a valid response.
    pub fn panel() -> Self {
        let link = Self::new();
        link.reply_on_write(&handshake::REQUEST_MAGIC, vec![handshake::response().to_vec()]);
        link
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_read(&self, data: &[u8]) {
        self.state().reads.push_back(data.to_vec());
    }

    pub fn reply_on_write(&self, prefix: &[u8], replies: Vec<Vec<u8>>) {
        self.state()
            .write_replies
            .push((prefix.to_vec(), replies));
    }

    pub fn reply_on_drain(&self, reply: &[u8]) {
        self.state().drain_replies.push_back(reply.to_vec());
    }

    pub fn fail(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    pub fn events(&self) -> Vec<LinkEvent> {
        self.state().events.clone()
    }

    /// Every write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// All written bytes concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes().concat()
    }

    fn faulted(state: &MockState, fault: Fault) -> io::Result<()> {
        if state.faults.contains(&fault) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("injected {:?} fault", fault),
            ));
        }
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        let n = state.writes;
        state.writes += 1;
        Self::faulted(&state, Fault::Write(n))?;

        state.events.push(LinkEvent::Write(data.to_vec()));
        let replies: Vec<Vec<u8>> = state
            .write_replies
            .iter()
            .filter(|(prefix, _)| data.starts_with(prefix))
            .flat_map(|(_, replies)| replies.iter().cloned())
            .collect();
        state.reads.extend(replies);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let next = {
            let mut state = self.state();
            Self::faulted(&state, Fault::Read)?;
            state.reads.pop_front()
        };

        let Some(mut data) = next else {
            return match self.read_timeout {
                Some(timeout) => {
                    thread::sleep(timeout);
                    Ok(0)
                }
                None => Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "mock link has no scripted data",
                )),
            };
        };

        let mut state = self.state();
        if data.len() > buf.len() {
            let rest = data.split_off(buf.len());
            state.reads.push_front(rest);
        }
        buf[..data.len()].copy_from_slice(&data);
        state.events.push(LinkEvent::Read(data.clone()));
        Ok(data.len())
    }

    fn drain(&mut self) -> io::Result<()> {
        let mut state = self.state();
        Self::faulted(&state, Fault::Drain)?;
        state.events.push(LinkEvent::Drain);
        if let Some(reply) = state.drain_replies.pop_front() {
            state.reads.push_back(reply);
        }
        Ok(())
    }

    fn reset_input(&mut self) -> io::Result<()> {
        let mut state = self.state();
        Self::faulted(&state, Fault::ResetInput)?;
        state.events.push(LinkEvent::ResetInput);
        state.reads.clear();
        Ok(())
    }

    fn reset_output(&mut self) -> io::Result<()> {
        let mut state = self.state();
        Self::faulted(&state, Fault::ResetOutput)?;
        state.events.push(LinkEvent::ResetOutput);
        Ok(())
    }

    fn set_rts(&mut self, on: bool) -> io::Result<()> {
        self.state().events.push(LinkEvent::Rts(on));
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        Ok(Box::new(Self {
            state: Arc::clone(&self.state),
            read_timeout: None,
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
