//! # Gateway Session Handler
//!
//! One task per accepted TCP connection. The loop reads the fixed 8-byte
//! HART-IP header, then the declared body, and dispatches on the message id:
//! session initiate/close, keep-alive, and the token-passing PDUs that reach
//! the field bus through the shared transport. Requests are handled strictly
//! in arrival order; HART is half-duplex with a single outstanding command,
//! so there is nothing to pipeline.
//!
//! A socket error ends only this session. Once a session-initiate has
//! negotiated an inactivity close time, header reads are bounded by it and
//! an idle session is closed.

use crate::constants::HARTIP_HEADER_SIZE;
use crate::error::HartError;
use crate::hart::serial::HartPort;
use crate::hartip::header::{raw_byte_count, MessageHeader, MessageId};
use crate::hartip::pdu::PduProcessor;
use crate::hartip::server::SessionRegistry;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

/// Per-connection session state and request loop.
pub struct Session<P: HartPort> {
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    registry: SessionRegistry,
    pdu: PduProcessor<P>,
    shutdown: broadcast::Receiver<()>,
    sequence_number: u16,
    inactivity_timeout: Option<Duration>,
}

impl<P: HartPort> Session<P> {
    pub(crate) fn new(
        id: u64,
        stream: TcpStream,
        peer: SocketAddr,
        registry: SessionRegistry,
        pdu: PduProcessor<P>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Session {
            id,
            stream,
            peer,
            registry,
            pdu,
            shutdown,
            sequence_number: 0,
            inactivity_timeout: None,
        }
    }

    /// Runs the session loop until disconnect, session close or server
    /// shutdown. Deregisters itself on the way out.
    pub async fn run(mut self) {
        info!("session {} started for {}", self.id, self.peer);

        loop {
            let mut header_bytes = [0u8; HARTIP_HEADER_SIZE];
            let received = tokio::select! {
                _ = self.shutdown.recv() => {
                    debug!("session {} interrupted by shutdown", self.id);
                    break;
                }
                result = read_header(&mut self.stream, &mut header_bytes, self.inactivity_timeout) => result,
            };
            match received {
                Ok(true) => {}
                Ok(false) => {
                    info!("session {} closed after inactivity", self.id);
                    break;
                }
                Err(err) => {
                    debug!("session {} read ended: {err}", self.id);
                    break;
                }
            }

            let body = match self.read_body(&header_bytes).await {
                Ok(body) => body,
                Err(err) => {
                    debug!("session {} body read ended: {err}", self.id);
                    break;
                }
            };

            let header = match MessageHeader::parse(&header_bytes) {
                Ok(header) => header,
                Err(err) => {
                    // Unknown ids are a no-op, not a reason to drop the
                    // connection; the body has already been drained.
                    warn!("session {}: {err}", self.id);
                    continue;
                }
            };
            self.sequence_number = header.sequence_number;

            if let Err(err) = self.dispatch(&header, &body).await {
                warn!("session {} ended: {err}", self.id);
                break;
            }
            if header.message_id == MessageId::SessionClose {
                break;
            }
        }

        self.registry.remove(self.id);
        info!("session {} for {} finished", self.id, self.peer);
    }

    async fn read_body(&mut self, header_bytes: &[u8; 8]) -> Result<Vec<u8>, HartError> {
        let byte_count = raw_byte_count(header_bytes) as usize;
        let body_length = byte_count.saturating_sub(HARTIP_HEADER_SIZE);
        let mut body = vec![0u8; body_length];
        if body_length > 0 {
            self.stream.read_exact(&mut body).await?;
        }
        Ok(body)
    }

    async fn dispatch(&mut self, header: &MessageHeader, body: &[u8]) -> Result<(), HartError> {
        match header.message_id {
            MessageId::SessionInitiate => self.handle_session_initiate(body).await,
            MessageId::SessionClose => {
                debug!("session {} close requested", self.id);
                self.write_response(MessageId::SessionClose, &[]).await
            }
            MessageId::KeepAlive => self.write_response(MessageId::KeepAlive, &[]).await,
            MessageId::TokenPassingPdu => self.handle_token_passing(body).await,
            MessageId::Discovery => {
                debug!("session {}: discovery not implemented", self.id);
                Ok(())
            }
        }
    }

    /// Body layout: one flag byte, then the requested inactivity close time
    /// in milliseconds as four big-endian bytes. The response echoes the
    /// timeout bytes behind a 0x01 marker.
    async fn handle_session_initiate(&mut self, body: &[u8]) -> Result<(), HartError> {
        if body.len() < 5 {
            warn!(
                "session {}: short session-initiate body ({} bytes)",
                self.id,
                body.len()
            );
            return Ok(());
        }

        let timeout_bytes = [body[1], body[2], body[3], body[4]];
        let timeout_ms = u32::from_be_bytes(timeout_bytes);
        if timeout_ms > 0 {
            self.inactivity_timeout = Some(Duration::from_millis(u64::from(timeout_ms)));
        }
        info!(
            "session {} initiated, inactivity close time {timeout_ms} ms",
            self.id
        );

        let mut response_body = vec![0x01];
        response_body.extend_from_slice(&timeout_bytes);
        self.write_response(MessageId::SessionInitiate, &response_body)
            .await
    }

    /// Forwards the PDU to the processor; an empty result sends no reply and
    /// leaves the client to its own timeout.
    async fn handle_token_passing(&mut self, body: &[u8]) -> Result<(), HartError> {
        let response = self.pdu.process(body).await?;
        if response.is_empty() {
            debug!("session {}: no field-bus response, no reply sent", self.id);
            return Ok(());
        }
        self.write_response(MessageId::TokenPassingPdu, &response)
            .await
    }

    async fn write_response(&mut self, message_id: MessageId, body: &[u8]) -> Result<(), HartError> {
        let header = MessageHeader::response(message_id, self.sequence_number, body.len());
        let mut message = header.to_bytes();
        message.extend_from_slice(body);
        self.stream.write_all(&message).await?;
        Ok(())
    }
}

/// Reads a full header, bounded by the negotiated inactivity timeout when
/// one is set. `Ok(false)` reports an expired timeout.
async fn read_header(
    stream: &mut TcpStream,
    buf: &mut [u8; 8],
    inactivity: Option<Duration>,
) -> Result<bool, HartError> {
    match inactivity {
        Some(limit) => match tokio::time::timeout(limit, stream.read_exact(buf)).await {
            Ok(result) => {
                result?;
                Ok(true)
            }
            Err(_) => Ok(false),
        },
        None => {
            stream.read_exact(buf).await?;
            Ok(true)
        }
    }
}
