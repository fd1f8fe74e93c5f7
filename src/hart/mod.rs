//! The hart module contains the field-bus side of the gateway: device
//! addressing, the frame codec and delimiter bit fields, the incremental
//! frame parser, the packed-ASCII text codecs and the serial transport.

pub mod address;
pub mod delimiter;
pub mod frame;
pub mod packed_ascii;
pub mod parser;
pub mod serial;
pub mod serial_mock;

pub use address::Address;
pub use delimiter::{AddressType, Delimiter, FrameType, PhysicalLayerType};
pub use frame::{CommunicationStatus, Frame};
pub use parser::CommandParser;
pub use serial::{HartPort, HartTransport, SerialLink, SerialSettings};
