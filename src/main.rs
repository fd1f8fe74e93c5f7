use clap::Parser;
use hart_rs::{
    init_logger, log_info, GatewayConfig, GatewayServer, ProcessorMode, SerialSettings,
    DEFAULT_HARTIP_PORT,
};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hart-gateway")]
#[command(about = "HART-IP gateway for a serially attached HART field device")]
struct Cli {
    /// Serial port of the field-bus modem, e.g. /dev/ttyUSB0
    port: String,

    /// Address the TCP listener binds to
    #[arg(long, default_value = "0.0.0.0")]
    listen: String,

    /// TCP port the listener binds to
    #[arg(long, default_value_t = DEFAULT_HARTIP_PORT)]
    tcp_port: u16,

    /// Preamble length for outgoing frames
    #[arg(long, default_value = "10")]
    preamble: usize,

    /// Response timeout in milliseconds
    #[arg(long, default_value = "4000")]
    timeout_ms: u64,

    /// Retries after a failed command
    #[arg(long, default_value = "2")]
    retries: u32,

    /// Relay every PDU to the field bus instead of emulating a gateway
    #[arg(long)]
    passthrough: bool,

    /// Long tag the gateway reports for command 20
    #[arg(long, default_value = "")]
    long_tag: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    let mut serial = SerialSettings::new(&cli.port);
    serial.preamble_length = cli.preamble;
    serial.timeout = Duration::from_millis(cli.timeout_ms);
    serial.max_retries = cli.retries;
    serial.reconnect_on_error = true;

    let mut config = GatewayConfig::new(serial);
    config.listen_address = cli.listen;
    config.port = cli.tcp_port;
    config.long_tag = cli.long_tag;
    if cli.passthrough {
        config.mode = ProcessorMode::SerialPassThrough;
    }

    let mut server = GatewayServer::open(config)?;
    server.start().await?;
    log_info("Gateway running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    log_info("Stopping gateway");
    server.stop().await;

    Ok(())
}
