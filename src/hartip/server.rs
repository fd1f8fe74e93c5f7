//! # HART-IP Gateway Server
//!
//! Accepts HART-IP TCP clients and runs one [`Session`] task per
//! connection. All sessions share a single serial transport behind an async
//! mutex; the field bus is half-duplex, so concurrent sessions serialize at
//! the transport and each request-response cycle runs undisturbed.
//!
//! Shutdown is broadcast to the accept loop and every live session, then
//! sessions get a short grace period to finish their current request before
//! being aborted.

use crate::error::HartError;
use crate::hart::serial::{HartPort, HartTransport, SerialLink, SerialSettings};
use crate::hartip::pdu::{PduProcessor, ProcessorMode};
use crate::hartip::session::Session;
use log::{info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Default HART-IP port.
pub const DEFAULT_HARTIP_PORT: u16 = 5094;

const SESSION_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Gateway configuration: where to listen and how to reach the field bus.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the TCP listener binds to.
    pub listen_address: String,
    /// TCP port the listener binds to.
    pub port: u16,
    /// Serial transport settings for the field-bus side.
    pub serial: SerialSettings,
    /// How token-passing PDUs are processed.
    pub mode: ProcessorMode,
    /// Long tag the gateway reports for command 20.
    pub long_tag: String,
}

impl GatewayConfig {
    pub fn new(serial: SerialSettings) -> Self {
        GatewayConfig {
            listen_address: "0.0.0.0".to_string(),
            port: DEFAULT_HARTIP_PORT,
            serial,
            mode: ProcessorMode::GatewayEmulation,
            long_tag: String::new(),
        }
    }
}

/// Shared index of live sessions, keyed by session id.
///
/// Sessions remove themselves when their task finishes; removal is
/// idempotent because shutdown may race a natural disconnect.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<StdMutex<HashMap<u64, JoinHandle<()>>>>,
}

impl SessionRegistry {
    fn insert(&self, id: u64, handle: JoinHandle<()>) {
        self.inner.lock().expect("registry lock").insert(id, handle);
    }

    pub(crate) fn remove(&self, id: u64) {
        self.inner.lock().expect("registry lock").remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drain(&self) -> Vec<(u64, JoinHandle<()>)> {
        self.inner.lock().expect("registry lock").drain().collect()
    }
}

/// The HART-IP gateway: TCP front end plus shared serial back end.
pub struct GatewayServer<P: HartPort + 'static> {
    config: GatewayConfig,
    transport: Arc<Mutex<HartTransport<P>>>,
    registry: SessionRegistry,
    shutdown: broadcast::Sender<()>,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl GatewayServer<SerialLink> {
    /// Opens the serial port from the configuration and builds the server.
    pub fn open(config: GatewayConfig) -> Result<Self, HartError> {
        let transport = HartTransport::open(&config.serial)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<P: HartPort + 'static> GatewayServer<P> {
    /// Builds the server around an already-open transport.
    pub fn with_transport(config: GatewayConfig, transport: HartTransport<P>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        GatewayServer {
            config,
            transport: Arc::new(Mutex::new(transport)),
            registry: SessionRegistry::default(),
            shutdown,
            accept_task: None,
            local_addr: None,
        }
    }

    /// Binds the TCP listener and spawns the accept loop.
    pub async fn start(&mut self) -> Result<(), HartError> {
        let listener =
            TcpListener::bind((self.config.listen_address.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("gateway listening on {local_addr}");

        let mode = self.config.mode;
        let preamble_length = self.config.serial.preamble_length;
        let long_tag = self.config.long_tag.clone();
        let transport = Arc::clone(&self.transport);
        let registry = self.registry.clone();
        let shutdown = self.shutdown.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        self.accept_task = Some(tokio::spawn(async move {
            let mut next_id: u64 = 0;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            next_id += 1;
                            let pdu = PduProcessor::new(
                                mode,
                                Arc::clone(&transport),
                                preamble_length,
                                long_tag.clone(),
                            );
                            let session = Session::new(
                                next_id,
                                stream,
                                peer,
                                registry.clone(),
                                pdu,
                                shutdown.subscribe(),
                            );
                            registry.insert(next_id, tokio::spawn(session.run()));
                        }
                        Err(err) => warn!("accept failed: {err}"),
                    },
                }
            }
            info!("accept loop stopped");
        }));
        Ok(())
    }

    /// The bound listener address, once [`start`](Self::start) has run.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Live session count.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Stops accepting, signals every session and waits a grace period for
    /// them to finish before aborting stragglers.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(());

        if let Some(mut handle) = self.accept_task.take() {
            if tokio::time::timeout(SESSION_SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }

        for (id, mut handle) in self.registry.drain() {
            if tokio::time::timeout(SESSION_SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
            {
                warn!("session {id} did not stop in time, aborting");
                handle.abort();
            }
        }
        info!("gateway stopped");
    }
}
