//! HART Protocol Constants
//!
//! Constants used across the field-bus and HART-IP layers, based on the
//! HART FSK physical layer and the HART-IP encapsulation.

use std::time::Duration;

/// Preamble byte preceding every HART frame on the wire.
pub const PREAMBLE_BYTE: u8 = 0xFF;

/// Minimum number of preamble bytes a received frame must carry.
pub const MIN_PREAMBLE_LENGTH: usize = 2;

/// Default number of preamble bytes prepended to outgoing frames.
pub const DEFAULT_PREAMBLE_LENGTH: usize = 10;

/// Default number of retries after a timeout or communication error.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default response timeout for one command cycle.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Delimiter mask for the address type bit.
pub const DELIMITER_MASK_ADDRESS_TYPE: u8 = 0x80;

/// Delimiter mask for the expansion byte count.
pub const DELIMITER_MASK_EXPANSION_BYTES: u8 = 0x60;

/// Delimiter mask for the physical layer type.
pub const DELIMITER_MASK_PHYSICAL_LAYER: u8 = 0x18;

/// Delimiter mask for the frame type.
pub const DELIMITER_MASK_FRAME_TYPE: u8 = 0x07;

/// Guard interval between asserting RTS and writing the frame.
pub const SEND_GUARD_BEFORE: Duration = Duration::from_millis(5);

/// Guard interval after the output queue drains, before releasing the line.
pub const SEND_GUARD_AFTER: Duration = Duration::from_millis(10);

/// Fixed HART FSK line rate.
pub const SERIAL_BAUD_RATE: u32 = 1200;

/// HART-IP message header size in bytes.
pub const HARTIP_HEADER_SIZE: usize = 8;

/// HART-IP protocol version carried in every header.
pub const HARTIP_VERSION: u8 = 1;

/// Response code returned by command 77 when the sub-device relay fails.
pub const RESPONSE_CODE_INVALID_SELECTION: u8 = 2;

/// Response code returned when a request carries too few data bytes.
pub const RESPONSE_CODE_TOO_FEW_DATA_BYTES: u8 = 5;

/// Command 0 identity payload the gateway answers with in emulation mode.
pub const GATEWAY_IDENTITY: [u8; 22] = [
    0xFE, // expansion code
    0xE4, // expanded device type
    0xA1, // expanded device type
    0x05, // minimum number of request preambles
    0x07, // HART universal revision
    0x01, // device revision
    0x07, // device software revision
    0x16, // hardware revision and physical signaling
    0x0C, // flags
    0xA0, // device id
    0x00, // device id
    0x6C, // device id
    0x05, // minimum number of response preambles
    0x08, // maximum number of device variables
    0x00, // configuration change counter
    0x00, // configuration change counter
    0x00, // extended device status
    0x60, // manufacturer id
    0xBC, // manufacturer id
    0x60, // private label distributor
    0xBC, // private label distributor
    0x04, // device profile: I/O system
];

/// Command 13 tag/descriptor/date payload in emulation mode (packed ASCII).
pub const GATEWAY_TAG_DESCRIPTOR_DATE: [u8; 21] = [
    0x20, 0xD5, 0x58, 0xD0, 0x44, 0xE0, 0x35, 0x98, 0x08, 0x05, 0x25, 0x20, 0x10, 0x55, 0x89,
    0x0C, 0x58, 0x00, 0x16, 0x02, 0x13,
];

/// Command 74 capability counters: gateway plus a single sub-device.
pub const IO_SYSTEM_CAPABILITIES: [u8; 8] = [
    0x02, // maximum number of I/O cards
    0x02, // maximum number of channels per I/O card
    0x01, // maximum number of sub-devices per channel
    0x00, // devices detected (high byte)
    0x02, // devices detected, including the I/O system itself
    0x02, // maximum number of delayed responses
    0x01, // master mode: primary master
    0x03, // retry count for sub-device commands
];
