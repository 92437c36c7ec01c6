//! Mock transports for testing

use super::{PulseBus, Transport};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock byte-stream transport for unit testing
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    auto_replies: VecDeque<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                auto_replies: VecDeque::new(),
            })),
        }
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.read_buffer.extend(data);
    }

    /// Queue a reply that becomes readable after the next write
    ///
    /// Request/reply drivers drain their input before sending, so a reply
    /// injected up front would be discarded; queued replies survive the
    /// drain and appear once the request goes out.
    pub fn queue_reply(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.auto_replies.push_back(data.to_vec());
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner.write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.write_buffer.clear();
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let available = inner.read_buffer.len().min(buffer.len());

        for item in buffer.iter_mut().take(available) {
            *item = inner.read_buffer.pop_front().unwrap();
        }

        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_buffer.extend_from_slice(data);
        if let Some(reply) = inner.auto_replies.pop_front() {
            inner.read_buffer.extend(reply);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.read_buffer.len())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock pulse bus recording every servo write
#[derive(Clone)]
pub struct MockPulseBus {
    inner: Arc<Mutex<MockPulseBusInner>>,
}

struct MockPulseBusInner {
    writes: Vec<(u8, u16)>,
    /// Fail the write with this index (0-based) and every one after it
    fail_from: Option<usize>,
}

impl MockPulseBus {
    /// Create a new mock pulse bus
    pub fn new() -> Self {
        MockPulseBus {
            inner: Arc::new(Mutex::new(MockPulseBusInner {
                writes: Vec::new(),
                fail_from: None,
            })),
        }
    }

    /// All `(channel, pulse)` writes issued so far, in order
    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// Pulses written to one channel, in order
    pub fn channel_writes(&self, channel: u8) -> Vec<u16> {
        self.inner
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|(ch, _)| *ch == channel)
            .map(|(_, pulse)| *pulse)
            .collect()
    }

    /// Clear recorded writes
    pub fn clear(&self) {
        self.inner.lock().unwrap().writes.clear();
    }

    /// Make the n-th write (0-based) and all later writes fail
    pub fn fail_from(&self, n: usize) {
        self.inner.lock().unwrap().fail_from = Some(n);
    }
}

impl PulseBus for MockPulseBus {
    fn write_pulse(&mut self, channel: u8, pulse: u16) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(n) = inner.fail_from
            && inner.writes.len() >= n
        {
            return Err(Error::I2c("mock bus failure".to_string()));
        }
        inner.writes.push((channel, pulse));
        Ok(())
    }
}

impl Default for MockPulseBus {
    fn default() -> Self {
        Self::new()
    }
}
