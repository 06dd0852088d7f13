//! Broker publisher: connection lifecycle, discovery announcement, and the
//! state cache write-through.
//!
//! ## Behaviour
//!
//! - **Lazy connect**: any publish while disconnected makes exactly one
//!   connect attempt first.
//! - **Re-announce on connect**: a broker restart may have lost retained
//!   discovery documents, so every successful connect re-publishes them.
//! - **No rollback**: a partially sent discovery set stays partial; calling
//!   [`Publisher::publish_config`] again is the retry.
//! - **Cache ownership**: [`Publisher::publish_data`] is the only writer of the
//!   [`StateCache`]; heartbeats read it.
use log::{debug, info, warn};

use super::discovery::{self, Announcement};
use super::payload::{state_payload, Lifecycle};
use super::{BrokerError, BrokerLink};
use crate::logutil::escape_log;
use crate::metrics;
use crate::telemetry::{InterpretedState, PayloadFormat, StateCache};

pub struct Publisher<L: BrokerLink> {
    link: L,
    format: PayloadFormat,
    base_topic: String,
    state_topic: String,
    retain_discovery: bool,
    cache: StateCache,
}

impl<L: BrokerLink> Publisher<L> {
    pub fn new(link: L, base_topic: &str, format: PayloadFormat, retain_discovery: bool) -> Self {
        Self {
            link,
            format,
            base_topic: base_topic.to_string(),
            state_topic: discovery::state_topic(base_topic),
            retain_discovery,
            cache: StateCache::new(),
        }
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    pub fn state_topic(&self) -> &str {
        &self.state_topic
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Swap in a new broker link and topic. The cached state is kept; the new
    /// link connects (and announces) on the next publish.
    pub fn reconfigure(&mut self, link: L, base_topic: &str, retain_discovery: bool) {
        self.link = link;
        self.base_topic = base_topic.to_string();
        self.state_topic = discovery::state_topic(base_topic);
        self.retain_discovery = retain_discovery;
        info!("Publisher reconfigured for topic {}", self.base_topic);
    }

    /// One connect attempt without announcing.
    async fn connect_link(&mut self) -> Result<(), BrokerError> {
        metrics::inc_connect_attempts();
        match self.link.connect().await {
            Ok(()) => Ok(()),
            Err(e) => {
                metrics::inc_connect_failures();
                warn!("MQTT connection failed: {}", e);
                Err(e)
            }
        }
    }

    /// Single connect attempt; on success re-announces discovery documents.
    /// Announcement failures are logged and do not fail the connect.
    pub async fn connect(&mut self) -> Result<(), BrokerError> {
        self.connect_link().await?;
        info!("MQTT connected");
        if let Err(e) = self.announce().await {
            warn!("Discovery announcement incomplete after connect: {}", e);
        }
        Ok(())
    }

    /// Publish on an already-live connection. Never reconnects.
    async fn send(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BrokerError> {
        match self.link.publish(topic, payload, retain).await {
            Ok(()) => {
                metrics::inc_publish_ok();
                debug!("MQTT -> {}: {}", topic, escape_log(payload));
                Ok(())
            }
            Err(e) => {
                metrics::inc_publish_failed();
                warn!("MQTT publish to {} failed: {}", topic, e);
                Err(e)
            }
        }
    }

    async fn publish_with(
        &mut self,
        topic: &str,
        payload: &str,
        retain: bool,
    ) -> Result<(), BrokerError> {
        if !self.link.is_connected() {
            self.connect().await?;
        }
        self.send(topic, payload, retain).await
    }

    /// Publish a non-retained message, connecting first if needed.
    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        self.publish_with(topic, payload, false).await
    }

    /// Send every discovery document, attempting all of them; returns the first
    /// failure.
    async fn announce(&mut self) -> Result<(), BrokerError> {
        let announcements: Vec<Announcement> =
            discovery::announcements(self.format, &self.base_topic);
        let retain = self.retain_discovery;
        let mut first_error = None;
        for ann in &announcements {
            if let Err(e) = self.send(&ann.topic, &ann.payload, retain).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => {
                debug!("Announced {} discovery documents", announcements.len());
                Ok(())
            }
            Some(e) => Err(e),
        }
    }

    /// Emit all discovery documents. When disconnected, one connect attempt is
    /// made and the documents are sent once.
    pub async fn publish_config(&mut self) -> Result<(), BrokerError> {
        if !self.link.is_connected() {
            self.connect_link().await?;
            info!("MQTT connected");
        }
        self.announce().await
    }

    /// Record a freshly interpreted reading and publish it tagged `UPDATE`.
    /// The cache is written even if the publish fails so heartbeats carry it.
    pub async fn publish_data(&mut self, state: InterpretedState) -> Result<(), BrokerError> {
        self.cache.update(state);
        let payload = state_payload(self.format, Lifecycle::Update, &state);
        info!("State update: {}", payload);
        let topic = self.state_topic.clone();
        self.publish(&topic, &payload).await
    }

    /// Re-publish the cached state tagged with `lifecycle`.
    pub async fn publish_lifecycle(&mut self, lifecycle: Lifecycle) -> Result<(), BrokerError> {
        let state = self.cache.current();
        let payload = state_payload(self.format, lifecycle, &state);
        debug!("Lifecycle {}: {}", lifecycle, payload);
        let topic = self.state_topic.clone();
        self.publish(&topic, &payload).await
    }
}
