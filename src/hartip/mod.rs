//! The hartip module contains the TCP side of the gateway: the message
//! header codec, per-connection sessions, the PDU processor and the server
//! that ties them to the shared serial transport.

pub mod header;
pub mod pdu;
pub mod server;
pub mod session;

pub use header::{MessageHeader, MessageId, MessageType};
pub use pdu::{PduProcessor, ProcessorMode};
pub use server::{GatewayConfig, GatewayServer, SessionRegistry, DEFAULT_HARTIP_PORT};
pub use session::Session;
