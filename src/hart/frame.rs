//! # HART Frame Codec
//!
//! Pure conversion between a HART command frame and its wire byte layout:
//! `preamble (N x 0xFF) | delimiter | address (1 or 5) | command | length |
//! [response code (2, responses only)] | data | checksum`.
//!
//! The length byte counts response-code and data bytes. The checksum is the
//! XOR of every byte from the delimiter through the last data byte. Request
//! frames carry no response-code bytes; response frames carry exactly two
//! (response code and device status) unless the length byte is zero.

use crate::constants::PREAMBLE_BYTE;
use crate::hart::address::Address;
use crate::hart::delimiter::{AddressType, Delimiter};
use bitflags::bitflags;
use bytes::{BufMut, BytesMut};

bitflags! {
    /// Diagnostic sub-bits of a communication-error response code byte.
    /// Only meaningful when the high bit (0x80) of the byte is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommunicationStatus: u8 {
        const VERTICAL_PARITY = 0x40;
        const OVERRUN = 0x20;
        const FRAMING = 0x10;
        const LONGITUDINAL_PARITY = 0x08;
        const BUFFER_OVERFLOW = 0x02;
    }
}

/// XOR checksum over a byte slice.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// A single HART command frame, request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub preamble_length: usize,
    pub delimiter: Delimiter,
    pub address: Address,
    pub command: u8,
    /// Empty for requests; `[response code, device status]` for responses.
    pub response_code: Vec<u8>,
    pub data: Vec<u8>,
}

impl Frame {
    /// Builds a request frame addressed with the device's current address.
    /// The delimiter follows the address variant (0x02 short, 0x82 long).
    pub fn request(preamble_length: usize, address: Address, command: u8, data: Vec<u8>) -> Self {
        let address_type = if address.is_long() {
            AddressType::Unique
        } else {
            AddressType::Polling
        };
        Frame {
            preamble_length,
            delimiter: Delimiter::request(address_type),
            address,
            command,
            response_code: Vec::new(),
            data,
        }
    }

    /// Builds the command-0 handshake request to polling address 0.
    pub fn zero(preamble_length: usize) -> Self {
        Frame {
            preamble_length,
            delimiter: Delimiter::request(AddressType::Polling),
            address: Address::Short { polling: 0 },
            command: 0,
            response_code: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Builds a field-device-to-master response frame.
    pub fn response(
        address: Address,
        address_type: AddressType,
        command: u8,
        response_code: u8,
        device_status: u8,
        data: Vec<u8>,
    ) -> Self {
        Frame {
            preamble_length: 0,
            delimiter: Delimiter::response(address_type),
            address,
            command,
            response_code: vec![response_code, device_status],
            data,
        }
    }

    /// Serializes the frame, filling in the trailing checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let address_bytes = self.address.to_bytes();
        let mut buf = BytesMut::with_capacity(
            self.preamble_length + address_bytes.len() + self.response_code.len() + self.data.len() + 4,
        );
        buf.put_bytes(PREAMBLE_BYTE, self.preamble_length);
        buf.put_u8(self.delimiter.byte());
        buf.put_slice(&address_bytes);
        buf.put_u8(self.command);
        buf.put_u8((self.data.len() + self.response_code.len()) as u8);
        buf.put_slice(&self.response_code);
        buf.put_slice(&self.data);
        let checksum = xor_checksum(&buf[self.preamble_length..]);
        buf.put_u8(checksum);
        buf.to_vec()
    }

    /// Serializes the frame without its preamble run (gateway relay format).
    pub fn to_bytes_without_preamble(&self) -> Vec<u8> {
        self.to_bytes().split_off(self.preamble_length)
    }

    /// The frame's XOR checksum, delimiter through last data byte.
    pub fn checksum(&self) -> u8 {
        let bytes = self.to_bytes();
        bytes[bytes.len() - 1]
    }

    /// Recomputes the checksum and compares against a received byte.
    pub fn is_checksum_correct(&self, received: u8) -> bool {
        self.checksum() == received
    }

    /// True when the response-code byte signals a communication error.
    pub fn has_communication_error(&self) -> bool {
        self.response_code.first().is_some_and(|b| b & 0x80 != 0)
    }

    /// Diagnostic communication-status bits of the response code byte.
    pub fn communication_status(&self) -> CommunicationStatus {
        CommunicationStatus::from_bits_truncate(self.response_code.first().copied().unwrap_or(0))
    }
}
