//! Test utilities & fixtures.
//! An in-memory broker link plus a ready-made station config.

use std::sync::{Arc, Mutex};

use maildisplay::config::Config;
use maildisplay::mqtt::{BrokerError, BrokerLink};
use maildisplay::telemetry::PayloadFormat;

/// One publish call as seen by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    pub accepted: bool,
}

#[derive(Debug, Default)]
pub struct BrokerState {
    pub reachable: bool,
    pub connected: bool,
    pub connect_attempts: usize,
    pub reject_topics: Vec<String>,
    pub sent: Vec<Sent>,
}

/// Broker stand-in. Clones share state so a test can keep a handle after the
/// link moves into a publisher.
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    pub state: Arc<Mutex<BrokerState>>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn reachable() -> Self {
        let broker = Self::default();
        broker.state.lock().unwrap().reachable = true;
        broker
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    /// Simulate the connection dying underneath the client.
    pub fn drop_connection(&self) {
        self.state.lock().unwrap().connected = false;
    }

    pub fn reject(&self, topic: &str) {
        self.state.lock().unwrap().reject_topics.push(topic.to_string());
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn accepted_on(&self, topic: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| s.accepted && s.topic == topic)
            .map(|s| s.payload)
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().sent.clear();
    }
}

impl BrokerLink for MockBroker {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.reachable {
            state.connected = true;
            Ok(())
        } else {
            Err(BrokerError::Connect("connection refused".to_string()))
        }
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        let accepted = state.connected && !state.reject_topics.iter().any(|t| t == topic);
        state.sent.push(Sent {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
            accepted,
        });
        if accepted {
            Ok(())
        } else {
            Err(BrokerError::Publish(format!("rejected {}", topic)))
        }
    }
}

#[allow(dead_code)]
pub fn test_config(format: PayloadFormat) -> Config {
    let mut config = Config::default();
    config.mqtt.host = "broker.test".to_string();
    config.mqtt.topic = "mailbox".to_string();
    config.radio.port = String::new();
    config.radio.format = format;
    config.metrics.stats_interval_secs = 0;
    config
}
