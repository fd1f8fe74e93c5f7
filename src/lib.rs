//! # hart-rs - A Rust Crate for HART Field-Bus Communication and HART-IP Gatewaying
//!
//! The hart-rs crate implements the HART (Highway Addressable Remote
//! Transducer) master side of the protocol over a serial field bus, plus a
//! HART-IP TCP gateway that exposes a serially attached field device to
//! network clients.
//!
//! ## Features
//!
//! - Connect to HART field devices over a 1200-baud odd-parity serial port
//! - Send commands with automatic retries, timeouts and address discovery
//! - Parse HART frames incrementally, with and without preambles
//! - Pack and unpack the 6-bit packed-ASCII text used by HART devices
//! - Serve HART-IP clients over TCP, in pass-through or gateway-emulation
//!   mode
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! To use the hart-rs crate in your Rust project, add the following to your
//! Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! hart-rs = "0.1.0"
//! ```
//!
//! Then, in your Rust code, you can import the necessary modules and
//! functions:
//!
//! ```rust
//! use hart_rs::{
//!     Address, Frame, CommandParser, HartTransport, SerialSettings,
//!     GatewayConfig, GatewayServer, HartError, init_logger, log_info,
//! };
//! ```

pub mod constants;
pub mod error;
pub mod hart;
pub mod hartip;
pub mod logging;

pub use crate::error::HartError;
pub use crate::logging::{init_logger, log_info};

// Field-bus types
pub use hart::{
    Address, AddressType, CommandParser, CommunicationStatus, Delimiter, Frame, FrameType,
    HartPort, HartTransport, PhysicalLayerType, SerialLink, SerialSettings,
};

// HART-IP gateway types
pub use hartip::{
    GatewayConfig, GatewayServer, MessageHeader, MessageId, MessageType, PduProcessor,
    ProcessorMode, Session, SessionRegistry, DEFAULT_HARTIP_PORT,
};
