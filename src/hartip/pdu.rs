//! # HART Protocol-Data-Unit Processor
//!
//! Processes the token-passing PDUs received from HART-IP clients. In
//! pass-through mode every PDU is relayed to the field device over the
//! serial transport. In gateway-emulation mode the gateway answers a set of
//! commands itself: its own identity (0, 13, 20, 31), I/O system
//! capabilities (74), and the sub-device relay pair (77, 84) that bridges
//! clients to the single physical device behind the gateway.
//!
//! Locally produced responses are encoded without a preamble, exactly as
//! they travel inside a token-passing PDU.

use crate::constants::{
    GATEWAY_IDENTITY, GATEWAY_TAG_DESCRIPTOR_DATE, IO_SYSTEM_CAPABILITIES,
    RESPONSE_CODE_INVALID_SELECTION, RESPONSE_CODE_TOO_FEW_DATA_BYTES,
};
use crate::error::HartError;
use crate::hart::frame::{xor_checksum, Frame};
use crate::hart::packed_ascii::{encode_text, unpack_ascii};
use crate::hart::parser::CommandParser;
use crate::hart::serial::{HartPort, HartTransport};
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How token-passing PDUs are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorMode {
    /// Forward every PDU directly to the field-bus network.
    SerialPassThrough,
    /// Answer gateway-side commands locally, relaying only sub-device
    /// traffic.
    GatewayEmulation,
}

/// Gateway-side emulation of HART commands.
pub struct PduProcessor<P: HartPort> {
    mode: ProcessorMode,
    transport: Arc<Mutex<HartTransport<P>>>,
    parser: CommandParser,
    preamble_length: usize,
    long_tag: String,
}

impl<P: HartPort> PduProcessor<P> {
    pub fn new(
        mode: ProcessorMode,
        transport: Arc<Mutex<HartTransport<P>>>,
        preamble_length: usize,
        long_tag: String,
    ) -> Self {
        PduProcessor {
            mode,
            transport,
            parser: CommandParser::new(false),
            preamble_length,
            long_tag,
        }
    }

    /// Processes one PDU (a HART frame without preamble) and returns the
    /// response PDU bytes. An empty result means no reply is sent.
    pub async fn process(&mut self, pdu: &[u8]) -> Result<Vec<u8>, HartError> {
        // Pass-through relays the body as received; the field device is the
        // one validating it.
        if self.mode == ProcessorMode::SerialPassThrough {
            let response = self
                .transport
                .lock()
                .await
                .send_raw(pdu, self.preamble_length)
                .await?;
            return Ok(response.unwrap_or_default());
        }

        self.parser.reset();
        let Some(request) = self.parser.parse_next_bytes(pdu) else {
            warn!("incomplete PDU of {} bytes dropped", pdu.len());
            return Ok(Vec::new());
        };

        debug!("gateway handling command {}", request.command);
        match request.command {
            0 => Ok(self.local_response(&request, 0, GATEWAY_IDENTITY.to_vec())),
            13 => Ok(self.local_response(&request, 0, GATEWAY_TAG_DESCRIPTOR_DATE.to_vec())),
            20 => {
                let tag = encode_text(&self.long_tag, 32)?;
                Ok(self.local_response(&request, 0, tag))
            }
            31 => Ok(self.local_response(&request, 0, vec![0x00])),
            74 => Ok(self.local_response(&request, 0, IO_SYSTEM_CAPABILITIES.to_vec())),
            77 => self.send_command_to_sub_device(&request).await,
            84 => self.read_sub_device_identity_summary(&request).await,
            other => {
                debug!("command {other} not implemented by gateway");
                Ok(Vec::new())
            }
        }
    }

    /// Encodes a local field-device-to-master response to `request`.
    fn local_response(&self, request: &Frame, response_code: u8, data: Vec<u8>) -> Vec<u8> {
        Frame::response(
            request.address.clone(),
            request.delimiter.address_type(),
            request.command,
            response_code,
            0,
            data,
        )
        .to_bytes()
    }

    /// Command 77: unwrap the sub-device envelope (I/O card, channel,
    /// preamble count), mark the embedded frame's address as
    /// master-originated, relay it raw, and re-wrap the raw response.
    async fn send_command_to_sub_device(&self, request: &Frame) -> Result<Vec<u8>, HartError> {
        let request_data = &request.data;
        if request_data.len() < 5 {
            return Ok(self.local_response(request, RESPONSE_CODE_TOO_FEW_DATA_BYTES, Vec::new()));
        }

        let io_card = request_data[0];
        let channel = request_data[1];
        let original_address_byte = request_data[4];

        // Embedded frame starts after the 3-byte envelope and carries no
        // checksum of its own; recompute after setting the master bit.
        let mut embedded = request_data[3..].to_vec();
        embedded[1] = original_address_byte | 0x80;
        embedded.push(xor_checksum(&embedded));

        let response = self
            .transport
            .lock()
            .await
            .send_raw(&embedded, self.preamble_length)
            .await?;

        match response {
            Some(mut raw) if raw.len() >= 2 => {
                raw[1] = original_address_byte;
                raw.pop(); // trailing checksum
                let mut data = vec![io_card, channel];
                data.extend_from_slice(&raw);
                Ok(self.local_response(request, 0, data))
            }
            _ => Ok(self.local_response(request, RESPONSE_CODE_INVALID_SELECTION, Vec::new())),
        }
    }

    /// Command 84: query the physical device's identity (command 0) and
    /// tag/descriptor (command 13), then assemble the composite sub-device
    /// identity summary.
    async fn read_sub_device_identity_summary(&self, request: &Frame) -> Result<Vec<u8>, HartError> {
        let (identity, tag_descriptor) = {
            let mut transport = self.transport.lock().await;
            let identity = transport.send(0, &[]).await?;
            let tag_descriptor = transport.send(13, &[]).await?;
            (identity, tag_descriptor)
        };

        let (Some(identity), Some(tag_descriptor)) = (identity, tag_descriptor) else {
            return Ok(self.local_response(request, RESPONSE_CODE_INVALID_SELECTION, Vec::new()));
        };
        if identity.data.len() < 12 || tag_descriptor.data.len() < 18 {
            return Ok(self.local_response(request, RESPONSE_CODE_INVALID_SELECTION, Vec::new()));
        }

        let tag = unpack_ascii(&tag_descriptor.data[..6], 6);
        let descriptor = unpack_ascii(&tag_descriptor.data[6..18], 12);
        let long_tag = encode_text(&format!("{tag} {descriptor}"), 30)?;

        let z = &identity.data;
        let mut data = vec![
            0x00, 0x01, // sub-device index
            0x00, // I/O card
            0x00, // channel
            0x00, z[1], // manufacturer id
            z[1], z[2], // expanded device type code
            z[9], z[10], z[11], // device id
            z[4], // universal command revision
        ];
        data.extend_from_slice(&long_tag);
        data.extend_from_slice(&[
            0x01, // device revision
            0x01, // device profile
            0x00, 0x00, // private label distributor code
        ]);

        Ok(self.local_response(request, 0, data))
    }
}
