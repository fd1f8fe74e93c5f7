//! # HART Serial Transport
//!
//! Owns the single half-duplex serial channel to the field device. Exactly
//! one command-and-wait cycle runs at a time; callers that share a transport
//! wrap it in a `tokio::sync::Mutex` and hold the lock for the full
//! send-wait-retry cycle so two commands never interleave on the wire.
//!
//! The send path follows HART line choreography: assert RTS and drop DTR,
//! wait a guard interval, write the frame, wait for the output queue to
//! drain plus another guard interval, then release the line for receive.
//! Timeouts and communication-error responses are retried up to the
//! configured bound; exhaustion yields `Ok(None)` rather than an error.

use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_PREAMBLE_LENGTH, DEFAULT_TIMEOUT, PREAMBLE_BYTE,
    SEND_GUARD_AFTER, SEND_GUARD_BEFORE, SERIAL_BAUD_RATE,
};
use crate::error::HartError;
use crate::hart::address::Address;
use crate::hart::frame::{CommunicationStatus, Frame};
use crate::hart::parser::CommandParser;
use log::{debug, error, warn};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

/// Serial channel configuration. Line parameters are fixed by HART
/// (1200 baud, odd parity, 8 data bits, 1 stop bit); only the behavioral
/// knobs are configurable.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub preamble_length: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub automatic_zero_command: bool,
    pub reconnect_on_error: bool,
}

impl SerialSettings {
    pub fn new(port_name: &str) -> Self {
        SerialSettings {
            port_name: port_name.to_string(),
            preamble_length: DEFAULT_PREAMBLE_LENGTH,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            automatic_zero_command: true,
            reconnect_on_error: false,
        }
    }
}

/// Trait for the half-duplex serial channel: byte I/O plus the RTS/DTR line
/// control and output-queue query HART's timing choreography needs.
#[async_trait::async_trait]
pub trait HartPort: AsyncReadExt + AsyncWriteExt + Unpin + Send {
    fn set_rts(&mut self, level: bool) -> Result<(), HartError>;
    fn set_dtr(&mut self, level: bool) -> Result<(), HartError>;
    /// Number of bytes still queued for transmission.
    fn output_pending(&mut self) -> Result<u32, HartError>;
    /// Closes and reopens the underlying channel where possible.
    async fn reconnect(&mut self) -> Result<(), HartError> {
        Ok(())
    }
}

/// A `tokio-serial` backed channel that remembers its port name so it can be
/// reopened after an unexpected error.
pub struct SerialLink {
    port_name: String,
    stream: SerialStream,
}

impl SerialLink {
    /// Opens the serial port with HART line parameters and parks the line in
    /// receive mode. Failures come back as typed results: port-not-found,
    /// port-already-open or unknown.
    pub fn open(port_name: &str) -> Result<Self, HartError> {
        let stream = Self::open_stream(port_name)?;
        let mut link = SerialLink {
            port_name: port_name.to_string(),
            stream,
        };
        link.set_rts(false)?;
        link.set_dtr(true)?;
        Ok(link)
    }

    fn open_stream(port_name: &str) -> Result<SerialStream, HartError> {
        tokio_serial::new(port_name, SERIAL_BAUD_RATE)
            .parity(tokio_serial::Parity::Odd)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|e| match e.kind {
                tokio_serial::ErrorKind::NoDevice => HartError::PortNotFound(port_name.to_string()),
                tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                    HartError::PortAlreadyOpen(port_name.to_string())
                }
                _ => HartError::PortOpenFailed {
                    port: port_name.to_string(),
                    reason: e.to_string(),
                },
            })
    }
}

impl AsyncRead for SerialLink {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for SerialLink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[async_trait::async_trait]
impl HartPort for SerialLink {
    fn set_rts(&mut self, level: bool) -> Result<(), HartError> {
        self.stream
            .write_request_to_send(level)
            .map_err(|e| HartError::SerialPortError(e.to_string()))
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), HartError> {
        self.stream
            .write_data_terminal_ready(level)
            .map_err(|e| HartError::SerialPortError(e.to_string()))
    }

    fn output_pending(&mut self) -> Result<u32, HartError> {
        self.stream
            .bytes_to_write()
            .map_err(|e| HartError::SerialPortError(e.to_string()))
    }

    async fn reconnect(&mut self) -> Result<(), HartError> {
        warn!("reopening serial port {}", self.port_name);
        self.stream = Self::open_stream(&self.port_name)?;
        self.set_rts(false)?;
        self.set_dtr(true)
    }
}

/// The field-bus transport: one in-flight command over one serial channel.
pub struct HartTransport<P: HartPort> {
    port: P,
    parser: CommandParser,
    pub preamble_length: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub automatic_zero_command: bool,
    pub reconnect_on_error: bool,
    current_address: Option<Address>,
}

impl HartTransport<SerialLink> {
    /// Opens the serial port and builds a transport over it.
    pub fn open(settings: &SerialSettings) -> Result<Self, HartError> {
        let link = SerialLink::open(&settings.port_name)?;
        Ok(Self::with_port(link, settings))
    }
}

impl<P: HartPort> HartTransport<P> {
    /// Builds a transport over an already-open channel.
    pub fn with_port(port: P, settings: &SerialSettings) -> Self {
        HartTransport {
            port,
            parser: CommandParser::new(true),
            preamble_length: settings.preamble_length,
            timeout: settings.timeout,
            max_retries: settings.max_retries,
            automatic_zero_command: settings.automatic_zero_command,
            reconnect_on_error: settings.reconnect_on_error,
            current_address: None,
        }
    }

    /// The device address captured from the last command-0 response.
    pub fn current_address(&self) -> Option<&Address> {
        self.current_address.as_ref()
    }

    /// Overrides the active device address.
    pub fn switch_address_to(&mut self, address: Address) {
        self.current_address = Some(address);
    }

    /// Sends a command to the active device and waits for its response.
    /// Returns `Ok(None)` when every attempt timed out or came back with a
    /// communication error.
    pub async fn send(&mut self, command: u8, data: &[u8]) -> Result<Option<Frame>, HartError> {
        if command == 0 {
            return self.send_zero_command().await;
        }
        if self.automatic_zero_command && !self.current_address.as_ref().is_some_and(Address::is_long)
        {
            self.send_zero_command().await?;
        }
        let address = self
            .current_address
            .clone()
            .unwrap_or(Address::Short { polling: 0 });
        let frame = Frame::request(self.preamble_length, address, command, data.to_vec());
        self.exchange(&frame.to_bytes()).await
    }

    /// Sends the command-0 handshake to polling address 0. A valid response
    /// switches the active address to the device's unique long address.
    pub async fn send_zero_command(&mut self) -> Result<Option<Frame>, HartError> {
        let frame = Frame::zero(self.preamble_length);
        self.exchange(&frame.to_bytes()).await
    }

    /// Relays a frame that already carries its own layout, prepending
    /// `preamble_length` preamble bytes for this call only. The response
    /// comes back as raw bytes with its preamble stripped.
    pub async fn send_raw(
        &mut self,
        frame_without_preamble: &[u8],
        preamble_length: usize,
    ) -> Result<Option<Vec<u8>>, HartError> {
        let mut bytes = vec![PREAMBLE_BYTE; preamble_length];
        bytes.extend_from_slice(frame_without_preamble);
        let response = self.exchange(&bytes).await?;
        Ok(response.map(|frame| frame.to_bytes_without_preamble()))
    }

    /// One command cycle with the retry policy: timeouts, communication
    /// errors and unexpected channel errors all consume an attempt.
    async fn exchange(&mut self, bytes: &[u8]) -> Result<Option<Frame>, HartError> {
        let mut attempts = self.max_retries + 1;
        while attempts > 0 {
            attempts -= 1;
            match self.transact(bytes).await {
                Ok(Some(frame)) => {
                    if frame.has_communication_error() {
                        log_communication_error(&frame);
                        continue;
                    }
                    return Ok(Some(frame));
                }
                Ok(None) => {
                    debug!("no response within {:?}, {} attempts left", self.timeout, attempts);
                }
                Err(err) => {
                    error!("unexpected error during send: {err}");
                    if self.reconnect_on_error {
                        if let Err(reopen_err) = self.port.reconnect().await {
                            error!("reconnect failed: {reopen_err}");
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Writes one frame with line-control choreography, then drives the
    /// parser with received bytes until a frame completes or the timeout
    /// elapses.
    async fn transact(&mut self, bytes: &[u8]) -> Result<Option<Frame>, HartError> {
        self.parser.reset();

        self.port.set_dtr(false)?;
        self.port.set_rts(true)?;
        tokio::time::sleep(SEND_GUARD_BEFORE).await;

        debug!("data sent: {}", hex::encode(bytes));
        self.port
            .write_all(bytes)
            .await
            .map_err(|e| HartError::SerialPortError(e.to_string()))?;
        while self.port.output_pending()? > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(SEND_GUARD_AFTER).await;

        self.port.set_rts(false)?;
        self.port.set_dtr(true)?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; 256];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match tokio::time::timeout(remaining, self.port.read(&mut buf)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => tokio::time::sleep(Duration::from_millis(2)).await,
                Ok(Ok(n)) => {
                    debug!("data received: {}", hex::encode(&buf[..n]));
                    if let Some(frame) = self.parser.parse_next_bytes(&buf[..n]) {
                        self.record_response(&frame);
                        return Ok(Some(frame));
                    }
                }
                Ok(Err(e)) => return Err(HartError::SerialPortError(e.to_string())),
            }
        }
    }

    /// A command-0 response carries the device's unique address in its
    /// payload; capture it so subsequent commands use the long address.
    fn record_response(&mut self, frame: &Frame) {
        if frame.command == 0 && frame.data.len() >= 12 {
            self.current_address = Some(Address::long(
                frame.data[1],
                frame.data[2],
                [frame.data[9], frame.data[10], frame.data[11]],
            ));
        }
    }
}

fn log_communication_error(frame: &Frame) {
    let status = frame.communication_status();
    warn!("communication error, response code {:#04x}", frame.response_code[0]);
    if status.contains(CommunicationStatus::VERTICAL_PARITY) {
        warn!("vertical parity error: received byte parity was not odd");
    }
    if status.contains(CommunicationStatus::OVERRUN) {
        warn!("overrun error: receive buffer byte overwritten before read");
    }
    if status.contains(CommunicationStatus::FRAMING) {
        warn!("framing error: stop bit not detected");
    }
    if status.contains(CommunicationStatus::LONGITUDINAL_PARITY) {
        warn!("longitudinal parity error: check byte mismatch");
    }
    if status.contains(CommunicationStatus::BUFFER_OVERFLOW) {
        warn!("buffer overflow: message too long for device receive buffer");
    }
}
