use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::{DeviceError, DeviceLink, DeviceResult};

/// In-memory board link for tests.
///
/// Clones share state, so a test keeps one handle to inspect what was sent
/// while the board owns another.
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    incoming: Arc<Mutex<Vec<u8>>>,
    later: Arc<Mutex<VecDeque<Vec<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the board will appear to have printed.
    pub fn queue_response(&self, bytes: &[u8]) {
        self.incoming.lock().unwrap().extend_from_slice(bytes);
    }

    /// Bytes that arrive only after the next read, one chunk per read.
    pub fn queue_after_read(&self, bytes: &[u8]) {
        self.later.lock().unwrap().push_back(bytes.to_vec());
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn waiting(&self) -> usize {
        self.incoming.lock().unwrap().len()
    }

    pub fn fail_writes(&self, enable: bool) {
        *self.fail_writes.lock().unwrap() = enable;
    }
}

impl DeviceLink for MockLink {
    fn write_all(&mut self, bytes: &[u8]) -> DeviceResult<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(DeviceError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated write error",
            )));
        }
        self.sent.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn bytes_waiting(&mut self) -> DeviceResult<u32> {
        Ok(self.incoming.lock().unwrap().len() as u32)
    }

    fn read_waiting(&mut self) -> DeviceResult<Vec<u8>> {
        let mut incoming = self.incoming.lock().unwrap();
        let read = std::mem::take(&mut *incoming);
        if let Some(next) = self.later.lock().unwrap().pop_front() {
            *incoming = next;
        }
        Ok(read)
    }
}
