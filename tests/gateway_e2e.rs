use hart_rs::constants::GATEWAY_IDENTITY;
use hart_rs::hart::serial_mock::MockSerialPort;
use hart_rs::{
    Address, AddressType, CommandParser, Frame, GatewayConfig, GatewayServer, HartTransport,
    ProcessorMode, SerialSettings,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn serial_settings() -> SerialSettings {
    let mut settings = SerialSettings::new("mock");
    settings.preamble_length = 5;
    settings.timeout = Duration::from_millis(50);
    settings.max_retries = 0;
    settings.automatic_zero_command = false;
    settings
}

async fn start_gateway(
    mode: ProcessorMode,
    port: &MockSerialPort,
) -> GatewayServer<MockSerialPort> {
    let settings = serial_settings();
    let transport = HartTransport::with_port(port.clone(), &settings);

    let mut config = GatewayConfig::new(settings);
    config.listen_address = "127.0.0.1".to_string();
    config.port = 0;
    config.mode = mode;
    config.long_tag = "GATEWAY".to_string();

    let mut server = GatewayServer::with_transport(config, transport);
    server.start().await.unwrap();
    server
}

async fn connect(server: &GatewayServer<MockSerialPort>) -> TcpStream {
    TcpStream::connect(server.local_addr().unwrap()).await.unwrap()
}

fn message(message_id: u8, sequence: u16, body: &[u8]) -> Vec<u8> {
    let byte_count = (8 + body.len()) as u16;
    let mut bytes = vec![1, 0, message_id, 0];
    bytes.extend_from_slice(&sequence.to_be_bytes());
    bytes.extend_from_slice(&byte_count.to_be_bytes());
    bytes.extend_from_slice(body);
    bytes
}

async fn read_message(stream: &mut TcpStream) -> (Vec<u8>, Vec<u8>) {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await.unwrap();
    let body_length = u16::from_be_bytes([header[6], header[7]]) as usize - 8;
    let mut body = vec![0u8; body_length];
    stream.read_exact(&mut body).await.unwrap();
    (header.to_vec(), body)
}

#[tokio::test]
async fn session_initiate_echoes_the_inactivity_timeout() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::GatewayEmulation, &port).await;
    let mut stream = connect(&server).await;

    // Inactivity close time 600000 ms.
    let body = [0x01, 0x00, 0x09, 0x27, 0xC0];
    stream.write_all(&message(0, 1, &body)).await.unwrap();

    let (header, response_body) = read_message(&mut stream).await;
    assert_eq!(header, vec![1, 1, 0, 0, 0, 1, 0, 13]);
    assert_eq!(response_body, vec![0x01, 0x00, 0x09, 0x27, 0xC0]);

    server.stop().await;
}

#[tokio::test]
async fn keep_alive_is_acknowledged_with_an_empty_body() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::GatewayEmulation, &port).await;
    let mut stream = connect(&server).await;

    stream.write_all(&message(2, 7, &[])).await.unwrap();
    let (header, body) = read_message(&mut stream).await;
    assert_eq!(header, vec![1, 1, 2, 0, 0, 7, 0, 8]);
    assert!(body.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn token_passing_pdu_answers_the_emulated_identity() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::GatewayEmulation, &port).await;
    let mut stream = connect(&server).await;

    let pdu = Frame::request(0, Address::short(0).unwrap(), 0, vec![]).to_bytes();
    stream.write_all(&message(3, 2, &pdu)).await.unwrap();

    let (header, body) = read_message(&mut stream).await;
    assert_eq!(header[2], 3);
    assert_eq!(header[4..6], [0, 2]);

    let frame = CommandParser::new(false).parse_next_bytes(&body).unwrap();
    assert_eq!(frame.command, 0);
    assert_eq!(frame.data, GATEWAY_IDENTITY.to_vec());

    server.stop().await;
}

#[tokio::test]
async fn pass_through_relays_over_the_serial_channel() {
    let port = MockSerialPort::new();
    let response = Frame::response(
        Address::short(0).unwrap(),
        AddressType::Polling,
        1,
        0,
        0,
        vec![0x42],
    );
    let mut queued = vec![0xFF; 3];
    queued.extend_from_slice(&response.to_bytes());
    port.queue_response(&queued);

    let mut server = start_gateway(ProcessorMode::SerialPassThrough, &port).await;
    let mut stream = connect(&server).await;

    let pdu = Frame::request(0, Address::short(0).unwrap(), 1, vec![]).to_bytes();
    stream.write_all(&message(3, 5, &pdu)).await.unwrap();

    let (_, body) = read_message(&mut stream).await;
    assert_eq!(body, response.to_bytes());
    // The request crossed the serial channel with the gateway preamble.
    assert_eq!(port.tx_data()[..5], [0xFF; 5]);

    server.stop().await;
}

#[tokio::test]
async fn unanswered_pdu_sends_no_reply() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::SerialPassThrough, &port).await;
    let mut stream = connect(&server).await;

    let pdu = Frame::request(0, Address::short(0).unwrap(), 1, vec![]).to_bytes();
    stream.write_all(&message(3, 5, &pdu)).await.unwrap();

    // A keep-alive sent afterwards is the next message answered.
    stream.write_all(&message(2, 6, &[])).await.unwrap();
    let (header, _) = read_message(&mut stream).await;
    assert_eq!(header[2], 2);
    assert_eq!(header[4..6], [0, 6]);

    server.stop().await;
}

#[tokio::test]
async fn session_close_is_acknowledged_and_ends_the_connection() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::GatewayEmulation, &port).await;
    let mut stream = connect(&server).await;

    stream.write_all(&message(1, 3, &[])).await.unwrap();
    let (header, _) = read_message(&mut stream).await;
    assert_eq!(header[2], 1);

    // The gateway side closes after the acknowledgment.
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);

    server.stop().await;
}

#[tokio::test]
async fn idle_session_is_closed_after_the_inactivity_timeout() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::GatewayEmulation, &port).await;
    let mut stream = connect(&server).await;

    // Negotiate a 50 ms inactivity close time, then go silent.
    let body = [0x01, 0x00, 0x00, 0x00, 0x32];
    stream.write_all(&message(0, 1, &body)).await.unwrap();
    let _ = read_message(&mut stream).await;

    let mut buf = [0u8; 1];
    let closed = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await;
    assert_eq!(closed.unwrap().unwrap(), 0);

    server.stop().await;
}

#[tokio::test]
async fn sessions_are_tracked_and_drained_on_stop() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::GatewayEmulation, &port).await;

    let mut first = connect(&server).await;
    let _second = connect(&server).await;
    first
        .write_all(&message(2, 1, &[]))
        .await
        .unwrap();
    let _ = read_message(&mut first).await;
    assert!(server.session_count() >= 1);

    server.stop().await;
    assert_eq!(server.session_count(), 0);
}

#[tokio::test]
async fn unknown_message_id_is_ignored() {
    let port = MockSerialPort::new();
    let mut server = start_gateway(ProcessorMode::GatewayEmulation, &port).await;
    let mut stream = connect(&server).await;

    stream.write_all(&message(9, 1, &[0xDE, 0xAD])).await.unwrap();
    // The session survives and answers the next well-formed message.
    stream.write_all(&message(2, 2, &[])).await.unwrap();
    let (header, _) = read_message(&mut stream).await;
    assert_eq!(header[2], 2);

    server.stop().await;
}
