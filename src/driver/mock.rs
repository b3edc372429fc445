//! FIFO-backed mock radio.
//!
//! Inbound frames and errors are queued ahead of time; the last frame in
//! each direction is captured for assertions. Handles are cheap clones
//! sharing one state, so a test can keep a handle while the network owns
//! another:
//!
//! ```ignore
//! let mock = MockDriver::new();
//! let mut net = Network::new(mock.clone(), store, &config);
//! mock.push_packet(frame);
//! net.cycle();
//! assert_eq!(mock.last_out_packet(), expected);
//! ```

use super::Driver;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    inbound: VecDeque<Vec<u8>>,
    errors: VecDeque<String>,
    last_in: Vec<u8>,
    last_out: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    inner: Arc<Mutex<Inner>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be returned by the next `recv`.
    pub fn push_packet(&self, data: Vec<u8>) {
        self.inner.lock().unwrap().inbound.push_back(data);
    }

    /// Queue an error string to be drained by `last_error`.
    pub fn push_error(&self, err: impl Into<String>) {
        self.inner.lock().unwrap().errors.push_back(err.into());
    }

    /// The most recent frame handed to the network.
    pub fn last_in_packet(&self) -> Vec<u8> {
        self.inner.lock().unwrap().last_in.clone()
    }

    /// The most recent frame the network transmitted.
    pub fn last_out_packet(&self) -> Vec<u8> {
        self.inner.lock().unwrap().last_out.clone()
    }
}

impl Driver for MockDriver {
    fn send(&mut self, data: &[u8]) {
        self.inner.lock().unwrap().last_out = data.to_vec();
    }

    fn recv(&mut self, _timeout: Duration) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let data = inner.inbound.pop_front();
        inner.last_in = data.clone().unwrap_or_default();
        data
    }

    fn last_error(&mut self) -> String {
        self.inner
            .lock()
            .unwrap()
            .errors
            .pop_front()
            .unwrap_or_else(|| "OK".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recv_drains_in_fifo_order() {
        let mock = MockDriver::new();
        mock.push_packet(vec![1]);
        mock.push_packet(vec![2]);

        let mut driver = mock.clone();
        assert_eq!(driver.recv(Duration::ZERO), Some(vec![1]));
        assert_eq!(mock.last_in_packet(), vec![1]);
        assert_eq!(driver.recv(Duration::ZERO), Some(vec![2]));
        assert_eq!(driver.recv(Duration::ZERO), None);
    }

    #[test]
    fn send_captures_last_out() {
        let mock = MockDriver::new();
        let mut driver = mock.clone();
        driver.send(&[0xAA, 0xBB]);
        assert_eq!(mock.last_out_packet(), vec![0xAA, 0xBB]);
    }

    #[test]
    fn errors_drain_to_ok() {
        let mock = MockDriver::new();
        mock.push_error("tx underrun");
        let mut driver = mock.clone();
        assert_eq!(driver.last_error(), "tx underrun");
        assert_eq!(driver.last_error(), "OK");
    }
}
