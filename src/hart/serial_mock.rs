//! Mock serial port implementation for testing
//!
//! Simulates the half-duplex HART channel without hardware. Queued responses
//! are delivered one chunk per read, which mirrors the inter-frame gaps of
//! the real line and keeps one response from bleeding into the next command
//! cycle.

use crate::error::HartError;
use crate::hart::serial::HartPort;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Mock serial port that records writes and replays queued responses.
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Data written to the port (outgoing).
    tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Response chunks to be read from the port, one frame per chunk.
    rx_chunks: Arc<Mutex<VecDeque<VecDeque<u8>>>>,
    /// Simulated error returned by the next read or write.
    next_error: Arc<Mutex<Option<io::Error>>>,
    /// Last observed RTS/DTR levels.
    line_state: Arc<Mutex<(bool, bool)>>,
    /// Number of reconnect calls observed.
    reconnects: Arc<Mutex<u32>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one response; it is delivered within a single read chunk.
    pub fn queue_response(&self, bytes: &[u8]) {
        self.rx_chunks
            .lock()
            .unwrap()
            .push_back(bytes.iter().copied().collect());
    }

    /// Data written to the port so far.
    pub fn tx_data(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Clears recorded writes and pending responses.
    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_chunks.lock().unwrap().clear();
    }

    /// Makes the next read or write fail with `error`.
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Last observed (RTS, DTR) levels.
    pub fn line_state(&self) -> (bool, bool) {
        *self.line_state.lock().unwrap()
    }

    pub fn reconnect_count(&self) -> u32 {
        *self.reconnects.lock().unwrap()
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        let mut chunks = self.rx_chunks.lock().unwrap();
        if let Some(front) = chunks.front_mut() {
            let available = front.len().min(buf.remaining());
            let data: Vec<u8> = front.drain(..available).collect();
            buf.put_slice(&data);
            if front.is_empty() {
                chunks.pop_front();
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }
        self.tx_buffer.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait::async_trait]
impl HartPort for MockSerialPort {
    fn set_rts(&mut self, level: bool) -> Result<(), HartError> {
        self.line_state.lock().unwrap().0 = level;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), HartError> {
        self.line_state.lock().unwrap().1 = level;
        Ok(())
    }

    fn output_pending(&mut self) -> Result<u32, HartError> {
        Ok(0)
    }

    async fn reconnect(&mut self) -> Result<(), HartError> {
        *self.reconnects.lock().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_are_chunked() {
        let port = MockSerialPort::new();
        port.queue_response(&[1, 2, 3]);
        port.queue_response(&[4, 5]);

        let chunks = port.rx_chunks.lock().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], VecDeque::from(vec![1, 2, 3]));
    }

    #[test]
    fn clear_drops_pending_data() {
        let port = MockSerialPort::new();
        port.queue_response(&[1, 2, 3]);
        port.clear();
        assert!(port.rx_chunks.lock().unwrap().is_empty());
        assert!(port.tx_data().is_empty());
    }
}
