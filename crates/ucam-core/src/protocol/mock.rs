//! Scripted link for exercising the protocol without a camera.
//!
//! A [`MockLink`] holds a queue of scripted reads and a journal of everything
//! the session did to the link: opens, writes, flushes, closes and sleeps.
//! The connector, transports and sleeper it hands out all share that state.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::transport::{Connector, PortSettings, Sleeper, Transport};
use super::ProtocolError;

/// One entry in the link journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A transport was opened with these settings
    Open(PortSettings),
    /// Bytes written to the camera
    Write(Vec<u8>),
    /// Buffers discarded
    Flush,
    /// The transport was closed
    Close,
    /// The session slept
    Sleep(Duration),
}

/// What the next read returns
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Deliver these bytes, split across reads if the buffer is smaller
    Data(Vec<u8>),
    /// Nothing within the read timeout
    Silence,
    /// Fail with an I/O error of this kind
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct Shared {
    reads: VecDeque<ReadStep>,
    events: Vec<LinkEvent>,
    live_handles: usize,
    max_live_handles: usize,
    fail_next_open: bool,
}

/// Handle used by tests to script the camera and inspect the journal
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    shared: Arc<Mutex<Shared>>,
}

impl MockLink {
    /// Link with no scripted reads and an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Connector opening transports on this link
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Sleeper recording into this link's journal
    pub fn sleeper(&self) -> MockSleeper {
        MockSleeper {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queue bytes for the next read
    pub fn push_read(&self, bytes: impl Into<Vec<u8>>) -> &Self {
        self.lock().reads.push_back(ReadStep::Data(bytes.into()));
        self
    }

    /// Queue `count` reads that time out
    pub fn push_silence(&self, count: usize) -> &Self {
        let mut shared = self.lock();
        for _ in 0..count {
            shared.reads.push_back(ReadStep::Silence);
        }
        self
    }

    /// Queue a failing read
    pub fn push_failure(&self, kind: io::ErrorKind) -> &Self {
        self.lock().reads.push_back(ReadStep::Fail(kind));
        self
    }

    /// Queue an ACK for `command_id`, followed by `trailing` in the same read
    pub fn push_ack(&self, command_id: u8, trailing: &[u8]) -> &Self {
        let mut bytes = vec![0xAA, 0x0E, command_id, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(trailing);
        self.push_read(bytes)
    }

    /// Queue a NAK carrying `error_code`
    pub fn push_nak(&self, error_code: u8) -> &Self {
        self.push_read(vec![0xAA, 0x0F, 0x00, 0x00, error_code, 0x00])
    }

    /// Make the next open fail
    pub fn fail_next_open(&self) {
        self.lock().fail_next_open = true;
    }

    /// Full journal in order
    pub fn events(&self) -> Vec<LinkEvent> {
        self.lock().events.clone()
    }

    /// Every write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every sleep, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::Sleep(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    /// Settings of every open, in order
    pub fn opens(&self) -> Vec<PortSettings> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::Open(settings) => Some(settings.clone()),
                _ => None,
            })
            .collect()
    }

    /// Most transports that were ever open at the same time
    pub fn max_live_handles(&self) -> usize {
        self.lock().max_live_handles
    }

    /// Reads still queued
    pub fn pending_reads(&self) -> usize {
        self.lock().reads.len()
    }

    /// Forget the journal, keeping queued reads
    pub fn clear_events(&self) {
        self.lock().events.clear();
    }
}

fn lock(shared: &Arc<Mutex<Shared>>) -> MutexGuard<'_, Shared> {
    // A panicking test thread must not hide the journal from the others
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`Connector`] for a [`MockLink`]
#[derive(Debug)]
pub struct MockConnector {
    shared: Arc<Mutex<Shared>>,
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn open(&mut self, settings: &PortSettings) -> Result<MockTransport, ProtocolError> {
        let mut shared = lock(&self.shared);
        if shared.fail_next_open {
            shared.fail_next_open = false;
            return Err(ProtocolError::SerialError(format!(
                "{}: scripted open failure",
                settings.port_name
            )));
        }
        shared.events.push(LinkEvent::Open(settings.clone()));
        shared.live_handles += 1;
        shared.max_live_handles = shared.max_live_handles.max(shared.live_handles);
        Ok(MockTransport {
            shared: Arc::clone(&self.shared),
        })
    }
}

/// [`Transport`] for a [`MockLink`]
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        lock(&self.shared)
            .events
            .push(LinkEvent::Write(bytes.to_vec()));
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = lock(&self.shared);
        match shared.reads.pop_front() {
            None | Some(ReadStep::Silence) => Ok(0),
            Some(ReadStep::Fail(kind)) => Err(io::Error::new(kind, "scripted read failure")),
            Some(ReadStep::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    shared.reads.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.shared).events.push(LinkEvent::Flush);
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        lock(&self.shared).events.push(LinkEvent::Close);
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        shared.live_handles = shared.live_handles.saturating_sub(1);
    }
}

/// [`Sleeper`] that records instead of waiting
#[derive(Debug)]
pub struct MockSleeper {
    shared: Arc<Mutex<Shared>>,
}

impl Sleeper for MockSleeper {
    fn sleep(&mut self, duration: Duration) {
        lock(&self.shared).events.push(LinkEvent::Sleep(duration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reads_split_across_small_buffers() {
        let link = MockLink::new();
        link.push_read(vec![1, 2, 3, 4, 5]);
        let mut transport = link.connector().open(&PortSettings::new("mock")).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        let mut rest = [0u8; 8];
        assert_eq!(transport.read(&mut rest).unwrap(), 3);
        assert_eq!(&rest[..3], &[3, 4, 5]);
        assert_eq!(transport.read(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_journal_and_handle_tracking() {
        let link = MockLink::new();
        let mut connector = link.connector();
        let mut transport = connector.open(&PortSettings::new("mock")).unwrap();
        transport.write_all(&[0xAA]).unwrap();
        transport.close().unwrap();
        let _second = connector.open(&PortSettings::new("mock")).unwrap();

        assert_eq!(link.max_live_handles(), 1);
        assert_eq!(link.writes(), vec![vec![0xAA]]);
        assert_eq!(link.opens().len(), 2);
    }

    #[test]
    fn test_scripted_failures() {
        let link = MockLink::new();
        link.fail_next_open();
        assert!(link.connector().open(&PortSettings::new("mock")).is_err());

        link.push_failure(io::ErrorKind::BrokenPipe);
        let mut transport = link.connector().open(&PortSettings::new("mock")).unwrap();
        let mut buf = [0u8; 4];
        assert!(transport.read(&mut buf).is_err());
    }
}
