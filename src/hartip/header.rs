//! # HART-IP Message Header
//!
//! Every HART-IP TCP message starts with a fixed 8-byte header:
//! `version | message type | message id | status | sequence number (u16 BE) |
//! byte count (u16 BE)`. The byte count is the total message size, header
//! included, so it is never below 8.

use crate::constants::{HARTIP_HEADER_SIZE, HARTIP_VERSION};
use crate::error::HartError;
use bytes::{BufMut, BytesMut};

/// HART-IP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    PublishNotification,
    Nak,
}

impl MessageType {
    pub fn byte(&self) -> u8 {
        match self {
            MessageType::Request => 0,
            MessageType::Response => 1,
            MessageType::PublishNotification => 2,
            MessageType::Nak => 15,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = HartError;

    fn try_from(byte: u8) -> Result<Self, HartError> {
        match byte {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Response),
            2 => Ok(MessageType::PublishNotification),
            15 => Ok(MessageType::Nak),
            other => Err(HartError::UnknownMessageType(other)),
        }
    }
}

/// HART-IP message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    SessionInitiate,
    SessionClose,
    KeepAlive,
    TokenPassingPdu,
    Discovery,
}

impl MessageId {
    pub fn byte(&self) -> u8 {
        match self {
            MessageId::SessionInitiate => 0,
            MessageId::SessionClose => 1,
            MessageId::KeepAlive => 2,
            MessageId::TokenPassingPdu => 3,
            MessageId::Discovery => 128,
        }
    }
}

impl TryFrom<u8> for MessageId {
    type Error = HartError;

    fn try_from(byte: u8) -> Result<Self, HartError> {
        match byte {
            0 => Ok(MessageId::SessionInitiate),
            1 => Ok(MessageId::SessionClose),
            2 => Ok(MessageId::KeepAlive),
            3 => Ok(MessageId::TokenPassingPdu),
            128 => Ok(MessageId::Discovery),
            other => Err(HartError::UnknownMessageId(other)),
        }
    }
}

/// The fixed 8-byte HART-IP message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u8,
    pub message_type: MessageType,
    pub message_id: MessageId,
    pub status: u8,
    pub sequence_number: u16,
    pub byte_count: u16,
}

impl MessageHeader {
    /// Builds a response header echoing the request's sequence number.
    /// `body_length` is the body size; the byte count includes the header.
    pub fn response(message_id: MessageId, sequence_number: u16, body_length: usize) -> Self {
        MessageHeader {
            version: HARTIP_VERSION,
            message_type: MessageType::Response,
            message_id,
            status: 0,
            sequence_number,
            byte_count: (HARTIP_HEADER_SIZE + body_length) as u16,
        }
    }

    /// Decodes a header from its 8 wire bytes.
    pub fn parse(bytes: &[u8; 8]) -> Result<Self, HartError> {
        let byte_count = u16::from_be_bytes([bytes[6], bytes[7]]);
        if (byte_count as usize) < HARTIP_HEADER_SIZE {
            return Err(HartError::InvalidHeader(format!(
                "byte count {byte_count} below header size"
            )));
        }
        Ok(MessageHeader {
            version: bytes[0],
            message_type: MessageType::try_from(bytes[1])?,
            message_id: MessageId::try_from(bytes[2])?,
            status: bytes[3],
            sequence_number: u16::from_be_bytes([bytes[4], bytes[5]]),
            byte_count,
        })
    }

    /// The body length declared by the byte count.
    pub fn body_length(&self) -> usize {
        self.byte_count as usize - HARTIP_HEADER_SIZE
    }

    /// Encodes the header to its 8 wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HARTIP_HEADER_SIZE);
        buf.put_u8(self.version);
        buf.put_u8(self.message_type.byte());
        buf.put_u8(self.message_id.byte());
        buf.put_u8(self.status);
        buf.put_u16(self.sequence_number);
        buf.put_u16(self.byte_count);
        buf.to_vec()
    }
}

/// Reads the declared byte count out of raw header bytes without fully
/// decoding them, so a session can drain the body of a message it will
/// otherwise ignore.
pub fn raw_byte_count(bytes: &[u8; 8]) -> u16 {
    u16::from_be_bytes([bytes[6], bytes[7]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = MessageHeader::response(MessageId::TokenPassingPdu, 0x1234, 9);
        let bytes = header.to_bytes();
        assert_eq!(bytes, vec![1, 1, 3, 0, 0x12, 0x34, 0x00, 17]);
        let decoded = MessageHeader::parse(&bytes.try_into().unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn byte_count_below_header_size_is_rejected() {
        let bytes = [1, 0, 0, 0, 0, 0, 0, 7];
        assert!(matches!(
            MessageHeader::parse(&bytes),
            Err(HartError::InvalidHeader(_))
        ));
    }

    #[test]
    fn unknown_ids_are_errors() {
        let bytes = [1, 0, 9, 0, 0, 0, 0, 8];
        assert!(matches!(
            MessageHeader::parse(&bytes),
            Err(HartError::UnknownMessageId(9))
        ));
        let bytes = [1, 7, 0, 0, 0, 0, 0, 8];
        assert!(matches!(
            MessageHeader::parse(&bytes),
            Err(HartError::UnknownMessageType(7))
        ));
    }
}
