//! # HART Error Handling
//!
//! This module defines the HartError enum, which represents the different error
//! types that can occur in the hart-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur in the HART crate.
#[derive(Debug, Error)]
pub enum HartError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates the configured serial port does not exist.
    #[error("Serial port not found: {0}")]
    PortNotFound(String),

    /// Indicates the serial port is already held by another process.
    #[error("Serial port already open: {0}")]
    PortAlreadyOpen(String),

    /// Indicates an OS-level failure while opening the serial port.
    #[error("Cannot open serial port {port}: {reason}")]
    PortOpenFailed { port: String, reason: String },

    /// Indicates a polling address outside the 0-15 range.
    #[error("Invalid polling address: {0}")]
    InvalidPollingAddress(u8),

    /// Indicates a device identification number that is not 3 bytes long.
    #[error("Invalid device identification number length: {0}")]
    InvalidDeviceIdLength(usize),

    /// Indicates a malformed HART-IP message header.
    #[error("Invalid HART-IP header: {0}")]
    InvalidHeader(String),

    /// Indicates an unknown HART-IP message type byte.
    #[error("Unknown HART-IP message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// Indicates an unknown HART-IP message id byte.
    #[error("Unknown HART-IP message id: 0x{0:02X}")]
    UnknownMessageId(u8),

    /// Indicates a text value that does not fit its wire field.
    #[error("Text exceeds field length {max}")]
    TextTooLong { max: usize },

    /// Indicates an I/O error on the TCP side of the gateway.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
