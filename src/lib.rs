//! # maildisplay - Mailbox Sensor Base Station
//!
//! maildisplay receives telemetry from a battery-powered mailbox sensor over a
//! point-to-point LoRa link, raises a flag indicator when mail arrives, and
//! republishes the readings to an MQTT broker with Home Assistant discovery.
//!
//! ## Features
//!
//! - **Radio Ingestion**: Fixed-size frames from a serial-attached radio module, with gap-based resynchronisation.
//! - **Two Sensor Revisions**: Proximity (4-byte) and flag/battery (3-byte) payload formats behind one pipeline.
//! - **Home Assistant Discovery**: One retained config document per telemetry channel.
//! - **Best-Effort Publishing**: Lazy single-attempt broker connects; the next frame or heartbeat is the retry.
//! - **Heartbeats**: Periodic re-publication of the last known state.
//! - **Flag Servo**: Linux sysfs PWM output, or log-only on the bench.
//! - **Daemon Mode**: Background service support with TTY-aware logging and SIGHUP reload.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use maildisplay::config::Config;
//! use maildisplay::mqtt::{MqttLink, MqttSettings};
//! use maildisplay::station::Station;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let link = MqttLink::new(MqttSettings::from_config(&config.mqtt));
//!     let actuator = maildisplay::actuator::from_config(&config.actuator);
//!
//!     let mut station = Station::new(config, link, actuator);
//!     station.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`telemetry`] - frame decoding, interpretation, and the last-known-state cache
//! - [`mqtt`] - broker link, payloads, discovery documents, and the publisher
//! - [`actuator`] - flag servo backends
//! - [`heartbeat`] - heartbeat timer and pending flags
//! - [`radio`] - serial radio reader and frame assembly
//! - [`station`] - the control loop tying it together
//! - [`config`] - configuration management and validation
//! - [`validation`] - configuration value checks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   frames   ┌─────────────┐  state   ┌─────────────┐
//! │ Radio reader│ ─────────► │   Station   │ ───────► │  Publisher  │ ─► MQTT
//! └─────────────┘  (mpsc)    │ control loop│          └─────────────┘
//!                            └─────────────┘
//!        heartbeat / SIGHUP ──► flags ─┘  └──► flag servo
//! ```

pub mod actuator;
pub mod config;
pub mod heartbeat;
pub mod logutil;
pub mod metrics;
pub mod mqtt;
pub mod radio;
pub mod station;
pub mod telemetry;
pub mod validation;
