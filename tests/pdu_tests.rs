use hart_rs::constants::{GATEWAY_IDENTITY, GATEWAY_TAG_DESCRIPTOR_DATE, IO_SYSTEM_CAPABILITIES};
use hart_rs::hart::frame::xor_checksum;
use hart_rs::hart::packed_ascii::{encode_text, pack_ascii};
use hart_rs::hart::serial_mock::MockSerialPort;
use hart_rs::{
    Address, AddressType, CommandParser, Frame, FrameType, HartTransport, PduProcessor,
    ProcessorMode, SerialSettings,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn settings() -> SerialSettings {
    let mut settings = SerialSettings::new("mock");
    settings.preamble_length = 5;
    settings.timeout = Duration::from_millis(50);
    settings.max_retries = 0;
    settings.automatic_zero_command = false;
    settings
}

fn processor(mode: ProcessorMode, port: &MockSerialPort) -> PduProcessor<MockSerialPort> {
    let transport = HartTransport::with_port(port.clone(), &settings());
    PduProcessor::new(mode, Arc::new(Mutex::new(transport)), 5, "PUMP STATION 7".into())
}

fn request_pdu(command: u8, data: Vec<u8>) -> Vec<u8> {
    Frame::request(0, Address::short(0).unwrap(), command, data).to_bytes()
}

fn parse_pdu(pdu: &[u8]) -> Frame {
    CommandParser::new(false).parse_next_bytes(pdu).unwrap()
}

fn with_preamble(frame: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0xFF; 3];
    bytes.extend_from_slice(frame);
    bytes
}

#[tokio::test]
async fn emulated_identity_commands() {
    let port = MockSerialPort::new();
    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);

    let response = parse_pdu(&pdu.process(&request_pdu(0, vec![])).await.unwrap());
    assert_eq!(response.delimiter.frame_type(), FrameType::FieldDeviceToMaster);
    assert_eq!(response.response_code, vec![0x00, 0x00]);
    assert_eq!(response.data, GATEWAY_IDENTITY.to_vec());

    let response = parse_pdu(&pdu.process(&request_pdu(13, vec![])).await.unwrap());
    assert_eq!(response.data, GATEWAY_TAG_DESCRIPTOR_DATE.to_vec());

    let response = parse_pdu(&pdu.process(&request_pdu(74, vec![])).await.unwrap());
    assert_eq!(response.data, IO_SYSTEM_CAPABILITIES.to_vec());

    let response = parse_pdu(&pdu.process(&request_pdu(31, vec![])).await.unwrap());
    assert_eq!(response.data, vec![0x00]);

    // Nothing reached the field bus.
    assert!(port.tx_data().is_empty());
}

#[tokio::test]
async fn emulated_long_tag_is_padded_to_32_bytes() {
    let port = MockSerialPort::new();
    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);

    let response = parse_pdu(&pdu.process(&request_pdu(20, vec![])).await.unwrap());
    assert_eq!(response.data, encode_text("PUMP STATION 7", 32).unwrap());
    assert_eq!(response.data.len(), 32);
}

#[tokio::test]
async fn unknown_command_produces_no_reply() {
    let port = MockSerialPort::new();
    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);
    assert!(pdu.process(&request_pdu(33, vec![])).await.unwrap().is_empty());
}

#[tokio::test]
async fn incomplete_pdu_produces_no_reply() {
    let port = MockSerialPort::new();
    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);
    assert!(pdu.process(&[0x02, 0x00]).await.unwrap().is_empty());
}

#[tokio::test]
async fn pass_through_relays_to_the_field_bus() {
    let port = MockSerialPort::new();
    let response = Frame::response(
        Address::short(0).unwrap(),
        AddressType::Polling,
        1,
        0,
        0,
        vec![0x42],
    );
    port.queue_response(&with_preamble(&response.to_bytes()));

    let mut pdu = processor(ProcessorMode::SerialPassThrough, &port);
    let reply = pdu.process(&request_pdu(1, vec![])).await.unwrap();

    assert_eq!(reply, response.to_bytes());
    assert_eq!(port.tx_data()[..5], [0xFF; 5]);
    assert_eq!(port.tx_data()[5], 0x02);
}

#[tokio::test]
async fn pass_through_relays_single_data_byte_commands() {
    let port = MockSerialPort::new();
    // Command 59: write number of response preambles, one payload byte.
    let response = Frame::response(
        Address::short(0).unwrap(),
        AddressType::Polling,
        59,
        0,
        0,
        vec![0x05],
    );
    port.queue_response(&with_preamble(&response.to_bytes()));

    let mut pdu = processor(ProcessorMode::SerialPassThrough, &port);
    let request = request_pdu(59, vec![0x05]);
    let reply = pdu.process(&request).await.unwrap();

    assert_eq!(reply, response.to_bytes());
    // The body crossed the serial channel unmodified after the preamble.
    assert_eq!(port.tx_data()[5..], request[..]);
}

#[tokio::test]
async fn command_77_rewrites_and_relays_the_embedded_frame() {
    let port = MockSerialPort::new();
    // Sub-device response to the embedded command 1.
    let sub_response = [0x06, 0x80, 0x01, 0x02, 0x00, 0x00, 0x85];
    port.queue_response(&with_preamble(&sub_response));

    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);

    // io card 1, channel 2, 5 preambles, then the embedded request
    // (delimiter, address, command, length) without checksum.
    let request = request_pdu(77, vec![0x01, 0x02, 0x05, 0x02, 0x00, 0x01, 0x00]);
    let response = parse_pdu(&pdu.process(&request).await.unwrap());

    assert_eq!(response.command, 77);
    assert_eq!(response.response_code, vec![0x00, 0x00]);

    // The relayed frame carries the master bit and a fresh checksum.
    let tx = port.tx_data();
    assert_eq!(tx[..5], [0xFF; 5]);
    let relayed = &tx[5..];
    assert_eq!(relayed[..4], [0x02, 0x80, 0x01, 0x00]);
    assert_eq!(relayed[4], xor_checksum(&relayed[..4]));

    // The reply restores the address byte and drops the sub checksum.
    assert_eq!(
        response.data,
        vec![0x01, 0x02, 0x06, 0x00, 0x01, 0x02, 0x00, 0x00]
    );
}

#[tokio::test]
async fn command_77_with_short_data_reports_too_few_bytes() {
    let port = MockSerialPort::new();
    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);

    let response = parse_pdu(&pdu.process(&request_pdu(77, vec![0x01, 0x02])).await.unwrap());
    assert_eq!(response.response_code[0], 5);
    assert!(response.data.is_empty());
    assert!(port.tx_data().is_empty());
}

#[tokio::test]
async fn command_77_without_sub_device_response_reports_invalid_selection() {
    let port = MockSerialPort::new();
    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);

    let request = request_pdu(77, vec![0x01, 0x02, 0x05, 0x02, 0x00, 0x01, 0x00]);
    let response = parse_pdu(&pdu.process(&request).await.unwrap());
    assert_eq!(response.response_code[0], 2);
}

#[tokio::test]
async fn command_84_assembles_the_sub_device_summary() {
    let port = MockSerialPort::new();

    let mut identity = vec![0u8; 12];
    identity[1] = 0x26;
    identity[2] = 0x06;
    identity[4] = 0x07; // universal command revision
    identity[9] = 0xAA;
    identity[10] = 0xBB;
    identity[11] = 0xCC;
    let zero = Frame::response(
        Address::short(0).unwrap(),
        AddressType::Polling,
        0,
        0,
        0,
        identity,
    );
    port.queue_response(&with_preamble(&zero.to_bytes()));

    let mut tag_descriptor = pack_ascii("FT-101", 6);
    tag_descriptor.extend_from_slice(&pack_ascii("INLET FLOW", 12));
    tag_descriptor.extend_from_slice(&[0x16, 0x02, 0x13]);
    let thirteen = Frame::response(
        Address::long(0x26, 0x06, [0xAA, 0xBB, 0xCC]),
        AddressType::Unique,
        13,
        0,
        0,
        tag_descriptor,
    );
    port.queue_response(&with_preamble(&thirteen.to_bytes()));

    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);
    let response = parse_pdu(&pdu.process(&request_pdu(84, vec![0x00, 0x01])).await.unwrap());

    assert_eq!(response.response_code, vec![0x00, 0x00]);
    assert_eq!(response.data.len(), 12 + 30 + 4);
    assert_eq!(response.data[..5], [0x00, 0x01, 0x00, 0x00, 0x00]);
    assert_eq!(response.data[5], 0x26);
    assert_eq!(response.data[6..8], [0x26, 0x06]);
    assert_eq!(response.data[8..11], [0xAA, 0xBB, 0xCC]);
    assert_eq!(response.data[11], 0x07);

    // Tag and descriptor unpack with their packed-ASCII padding (8 and 16
    // characters) before being joined and re-encoded.
    let long_tag = encode_text("FT-101   INLET FLOW      ", 30).unwrap();
    assert_eq!(response.data[12..42], long_tag[..]);
    assert_eq!(response.data[42..], [0x01, 0x01, 0x00, 0x00]);
}

#[tokio::test]
async fn command_84_without_field_device_reports_invalid_selection() {
    let port = MockSerialPort::new();
    let mut pdu = processor(ProcessorMode::GatewayEmulation, &port);

    let response = parse_pdu(&pdu.process(&request_pdu(84, vec![0x00, 0x01])).await.unwrap());
    assert_eq!(response.response_code[0], 2);
}
