// FitNode: WiFi & WebSocket Transport
//
// The relay connects to ws://<node>:81/ws.  Inbound text frames are queued
// by the HTTP server task and drained by the telemetry loop; outbound frames
// go to every connected client through detached senders.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::http::server::ws::EspHttpWsDetachedSender;
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::EspError;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, EspWifi};
use esp_idf_svc::ws::FrameType;

use fitnode::config::{NetworkConfig, WS_PATH};
use fitnode::error::{NodeError, Result};
use fitnode::hal::Transport;
use fitnode::link::PeerList;

/// Largest inbound frame accepted; commands are tiny.
const MAX_FRAME_LEN: usize = 512;
/// Oldest inbound messages are dropped beyond this.
const MAX_QUEUED: usize = 16;

/// Join the configured network in station mode.  Blocks until the netif is up.
pub fn connect_wifi(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    config: &NetworkConfig,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), Some(nvs))?, sysloop)?;

    wifi.set_configuration(&esp_idf_svc::wifi::Configuration::Client(ClientConfiguration {
        ssid: config
            .wifi_ssid
            .try_into()
            .map_err(|_| anyhow::anyhow!("SSID too long"))?,
        password: config
            .wifi_password
            .try_into()
            .map_err(|_| anyhow::anyhow!("WiFi password too long"))?,
        auth_method: AuthMethod::WPA2Personal,
        ..Default::default()
    }))?;

    wifi.start()?;
    log::info!("WiFi started, connecting to '{}'", config.wifi_ssid);
    wifi.connect()?;
    wifi.wait_netif_up()?;

    let ip = wifi.wifi().sta_netif().get_ip_info()?;
    log::info!("WiFi up: ws://{}:{}{}", ip.ip, config.ws_port, WS_PATH);
    Ok(wifi)
}

/// Inbound frames and relay sessions live behind separate locks, and no
/// lock is held across a detached send (it waits on the server task).
pub struct WsTransport {
    _server: EspHttpServer<'static>,
    inbound: Arc<Mutex<VecDeque<String>>>,
    clients: Arc<PeerList<EspHttpWsDetachedSender>>,
}

impl WsTransport {
    pub fn start(config: &NetworkConfig) -> anyhow::Result<Self> {
        let server_config = Configuration {
            http_port: config.ws_port,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&server_config)?;
        let inbound = Arc::new(Mutex::new(VecDeque::new()));
        let clients = Arc::new(PeerList::new());

        let handler_inbound = Arc::clone(&inbound);
        let handler_clients = Arc::clone(&clients);
        server.ws_handler(WS_PATH, move |ws| -> core::result::Result<(), EspError> {
            let session = ws.session();

            if ws.is_new() {
                handler_clients.add(session, ws.create_detached_sender()?);
                log::info!(
                    "Relay connected (session {}, {} client(s))",
                    session,
                    handler_clients.len()
                );
                return Ok(());
            }

            if ws.is_closed() {
                handler_clients.remove(session);
                log::info!("Relay disconnected (session {})", session);
                return Ok(());
            }

            let mut buf = [0u8; MAX_FRAME_LEN];
            let (frame_type, len) = ws.recv(&mut buf)?;
            if let FrameType::Text(_) = frame_type {
                let text = String::from_utf8_lossy(&buf[..len]).trim_end_matches('\0').to_string();
                if let Ok(mut queue) = handler_inbound.lock() {
                    if queue.len() >= MAX_QUEUED {
                        queue.pop_front();
                    }
                    queue.push_back(text);
                }
            }
            Ok(())
        })?;

        log::info!("WebSocket server listening on :{}{}", config.ws_port, WS_PATH);
        Ok(Self {
            _server: server,
            inbound,
            clients,
        })
    }
}

impl Transport for WsTransport {
    fn poll_inbound(&mut self) -> Vec<String> {
        match self.inbound.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn send(&mut self, payload: &str) -> Result<()> {
        let delivered = self.clients.broadcast(|session, sender| {
            match sender.send(FrameType::Text(false), payload.as_bytes()) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Dropping relay session {}: {}", session, e);
                    false
                }
            }
        });
        if delivered == 0 {
            Err(NodeError::LinkLost)
        } else {
            Ok(())
        }
    }

    fn is_connected(&self) -> bool {
        !self.clients.is_empty()
    }
}
