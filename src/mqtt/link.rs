//! rumqttc-backed [`BrokerLink`].
//!
//! rumqttc splits a connection into an `AsyncClient` (request sender) and an
//! `EventLoop` that must be polled for any network progress. `connect` polls
//! the fresh event loop until CONNACK under a timeout; once accepted the event
//! loop is moved into a driver task that flips the shared `connected` flag off
//! when the connection dies. The next `connect` discards the dead pair and
//! builds a new one.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;

use super::{BrokerError, BrokerLink};
use crate::config::MqttConfig;

/// Outbound request queue depth between client and event loop.
const REQUEST_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
}

impl MqttSettings {
    pub fn from_config(cfg: &MqttConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            client_id: cfg.effective_client_id(),
            keep_alive: Duration::from_secs(cfg.keep_alive_secs),
            connect_timeout: Duration::from_millis(cfg.connect_timeout_ms),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct MqttLink {
    settings: MqttSettings,
    client: Option<AsyncClient>,
    connected: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
}

impl MqttLink {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            driver: None,
        }
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    fn teardown(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.client = None;
        self.connected.store(false, Ordering::Release);
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            self.settings.host.clone(),
            self.settings.port,
        );
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);
        options
    }
}

/// Poll until the broker answers the CONNECT.
async fn await_connack(eventloop: &mut EventLoop) -> Result<(), BrokerError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(BrokerError::Connect(format!("refused: {:?}", ack.code)))
                };
            }
            Ok(other) => debug!("MQTT pre-connack event: {:?}", other),
            Err(e) => return Err(BrokerError::Connect(e.to_string())),
        }
    }
}

impl BrokerLink for MqttLink {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        self.teardown();
        debug!(
            "MQTT connecting to {} as {}",
            self.settings.endpoint(),
            self.settings.client_id
        );
        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);

        match tokio::time::timeout(self.settings.connect_timeout, await_connack(&mut eventloop))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(BrokerError::Connect(format!(
                    "no CONNACK from {} within {}ms",
                    self.settings.endpoint(),
                    self.settings.connect_timeout.as_millis()
                )))
            }
        }

        // Fresh flag per connection so a dying driver from an earlier session
        // can never clear the state of this one.
        let connected = Arc::new(AtomicBool::new(true));
        self.connected = Arc::clone(&connected);
        let endpoint = self.settings.endpoint();
        self.driver = Some(tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("MQTT broker {} closed the session", endpoint);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT connection to {} lost: {}", endpoint, e);
                        break;
                    }
                }
            }
            connected.store(false, Ordering::Release);
        }));
        self.client = Some(client);
        info!("MQTT session established with {}", self.settings.endpoint());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Acquire)
    }

    async fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BrokerError> {
        let client = match (&self.client, self.is_connected()) {
            (Some(client), true) => client,
            _ => return Err(BrokerError::Publish("not connected".to_string())),
        };
        client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.as_bytes().to_vec())
            .map_err(|e| BrokerError::Publish(e.to_string()))
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}
