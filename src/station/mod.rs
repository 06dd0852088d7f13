//! # Station Control Loop
//!
//! [`Station`] owns every piece of runtime state: the interpreter, the flag
//! driver, the publisher (and through it the broker link and state cache),
//! the pending flags, and the receiving end of the radio channel.
//!
//! All I/O happens on one task. Each pass of [`Station::poll_once`] checks,
//! in order:
//!
//! 1. the heartbeat flag, publishing the cached state tagged `HB`;
//! 2. radio frames waiting in the channel, each decoded, interpreted, shown on
//!    the flag and published tagged `UPDATE`;
//! 3. the reconfiguration flag, reloading the config file.
//!
//! Because frames are handled before the next heartbeat is looked at, a
//! heartbeat always carries the newest reading that arrived before it.

use anyhow::Result;
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use crate::actuator::{FlagActuator, FlagDriver};
use crate::config::{Config, MqttConfig};
use crate::heartbeat::{start_heartbeat, PendingFlag};
use crate::logutil::hex_frame;
use crate::metrics;
use crate::mqtt::{BrokerLink, Lifecycle, Publisher};
use crate::radio::FrameReceiver;
use crate::telemetry::{decode, Interpreter};

/// How often the loop looks at its flags and the radio channel.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Builds a fresh broker link from (re)loaded settings.
pub type LinkFactory<L> = Box<dyn Fn(&MqttConfig) -> L + Send>;

pub struct Station<L: BrokerLink, A: FlagActuator> {
    config: Config,
    config_path: Option<String>,
    link_factory: Option<LinkFactory<L>>,
    interpreter: Interpreter,
    publisher: Publisher<L>,
    flag: FlagDriver<A>,
    heartbeat: PendingFlag,
    reconfigure: PendingFlag,
    heartbeat_task: Option<JoinHandle<()>>,
    frame_rx: Option<FrameReceiver>,
}

impl<L: BrokerLink, A: FlagActuator> Station<L, A> {
    pub fn new(config: Config, link: L, actuator: A) -> Self {
        let publisher = Publisher::new(
            link,
            &config.mqtt.topic,
            config.radio.format,
            config.mqtt.retain_discovery,
        );
        let flag = FlagDriver::new(
            actuator,
            config.actuator.stowed_angle,
            config.actuator.deployed_angle,
        );
        Self {
            interpreter: Interpreter::new(config.interpreter.mail_threshold),
            publisher,
            flag,
            config,
            config_path: None,
            link_factory: None,
            heartbeat: PendingFlag::new(),
            reconfigure: PendingFlag::new(),
            heartbeat_task: None,
            frame_rx: None,
        }
    }

    /// Enable reloading from `path` when the reconfiguration flag is raised.
    pub fn with_reload(mut self, path: &str, link_factory: LinkFactory<L>) -> Self {
        self.config_path = Some(path.to_string());
        self.link_factory = Some(link_factory);
        self
    }

    pub fn attach_radio(&mut self, frame_rx: FrameReceiver) {
        self.frame_rx = Some(frame_rx);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn publisher(&self) -> &Publisher<L> {
        &self.publisher
    }

    pub fn flag(&self) -> &FlagDriver<A> {
        &self.flag
    }

    /// Producer handle for the heartbeat flag.
    pub fn heartbeat_flag(&self) -> PendingFlag {
        self.heartbeat.clone()
    }

    /// Producer handle for the reconfiguration flag.
    pub fn reconfigure_flag(&self) -> PendingFlag {
        self.reconfigure.clone()
    }

    /// Stow the flag, start the heartbeat timer, announce discovery and
    /// publish `START` from the sentinel cache. Broker failures are logged
    /// and left for the next event to retry.
    pub async fn startup(&mut self) {
        info!(
            "Station '{}' starting ({} payload format)",
            self.config.station.name, self.config.radio.format
        );
        self.flag.stow();
        self.restart_heartbeat();
        if let Err(e) = self.publisher.publish_config().await {
            warn!("Discovery not announced at startup: {}", e);
        }
        if let Err(e) = self.publisher.publish_lifecycle(Lifecycle::Start).await {
            warn!("START not published: {}", e);
        }
    }

    fn restart_heartbeat(&mut self) {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
        let period = self.config.heartbeat_period();
        info!("Heartbeat period {:?}", period);
        self.heartbeat_task = Some(start_heartbeat(period, self.heartbeat.clone()));
    }

    /// Decode, interpret, show and publish one raw frame. Returns `false` if
    /// the frame was rejected.
    pub async fn handle_frame(&mut self, frame: &[u8]) -> bool {
        metrics::inc_frames_received();
        let reading = match decode(self.config.radio.format, frame) {
            Ok(reading) => reading,
            Err(e) => {
                metrics::inc_frames_rejected();
                warn!("Discarding radio frame [{}]: {}", hex_frame(frame, 16), e);
                return false;
            }
        };
        let state = self.interpreter.interpret(&reading);
        debug!("Reading {:?} -> {:?}", reading, state);
        self.flag.set_position(state.status);
        if let Err(e) = self.publisher.publish_data(state).await {
            debug!("Update deferred: {}", e);
        }
        true
    }

    /// One pass over the pending work: heartbeat, radio, reconfiguration.
    pub async fn poll_once(&mut self) {
        if self.heartbeat.take() {
            metrics::inc_heartbeats();
            if let Err(e) = self.publisher.publish_lifecycle(Lifecycle::Heartbeat).await {
                debug!("Heartbeat deferred: {}", e);
            }
        }

        for frame in self.drain_frames() {
            self.handle_frame(&frame).await;
        }

        if self.reconfigure.take() {
            self.reload().await;
        }
    }

    fn drain_frames(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let Some(rx) = self.frame_rx.as_mut() else {
            return frames;
        };
        loop {
            match rx.try_recv() {
                Ok(frame) => frames.push(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Radio reader stopped; continuing with heartbeats only");
                    self.frame_rx = None;
                    break;
                }
            }
        }
        frames
    }

    /// Re-read the config file and apply interpreter, actuator, heartbeat and
    /// broker settings. A config that fails to load or validate is ignored.
    /// Radio port and payload format changes need a restart.
    pub async fn reload(&mut self) {
        let (Some(path), Some(factory)) = (self.config_path.as_deref(), self.link_factory.as_ref())
        else {
            info!("Reconfiguration requested; re-announcing discovery");
            if let Err(e) = self.publisher.publish_config().await {
                warn!("Discovery not announced: {}", e);
            }
            return;
        };

        info!("Reloading configuration from {}", path);
        let new = match Config::load(path).await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Keeping current configuration: {}", e);
                return;
            }
        };

        if new.radio.port != self.config.radio.port || new.radio.format != self.config.radio.format
        {
            warn!("Radio settings changed; restart the station to apply them");
        }
        let link = factory(&new.mqtt);
        self.interpreter = Interpreter::new(new.interpreter.mail_threshold);
        self.flag
            .set_angles(new.actuator.stowed_angle, new.actuator.deployed_angle);
        self.publisher
            .reconfigure(link, &new.mqtt.topic, new.mqtt.retain_discovery);

        let heartbeat_changed = new.heartbeat != self.config.heartbeat;
        let format = self.config.radio.format;
        let port = self.config.radio.port.clone();
        self.config = new;
        self.config.radio.format = format;
        self.config.radio.port = port;
        if heartbeat_changed {
            self.restart_heartbeat();
        }

        if let Err(e) = self.publisher.publish_config().await {
            warn!("Discovery not announced after reload: {}", e);
        }
    }

    /// Run until `shutdown` resolves.
    pub async fn run<F: Future<Output = ()>>(&mut self, shutdown: F) -> Result<()> {
        self.startup().await;

        let mut tick = interval(POLL_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = match self.config.metrics.stats_interval_secs {
            0 => None,
            secs => {
                let period = Duration::from_secs(secs);
                Some(interval_at(Instant::now() + period, period))
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = tick.tick() => {
                    self.poll_once().await;
                }
                _ = async {
                    match stats.as_mut() {
                        Some(s) => { s.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    info!("Stats: {}", metrics::snapshot());
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
        info!("Station stopped. {}", metrics::snapshot());
    }
}

impl<L: BrokerLink, A: FlagActuator> Drop for Station<L, A> {
    fn drop(&mut self) {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
    }
}

/// Raise `flag` on every SIGHUP.
#[cfg(unix)]
pub fn listen_for_reload(flag: PendingFlag) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reconfiguration pending");
            flag.set();
        }
    }))
}
