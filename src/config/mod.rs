//! # Configuration Management Module
//!
//! Loads, validates, and writes the station's TOML configuration.
//!
//! ## Configuration Structure
//!
//! - [`StationConfig`] - station identity
//! - [`RadioConfig`] - serial radio link and payload format
//! - [`InterpreterConfig`] - mail detection threshold
//! - [`MqttConfig`] - broker endpoint and topic prefix
//! - [`HeartbeatConfig`] - liveness period
//! - [`ActuatorConfig`] - flag servo output
//! - [`LoggingConfig`] - log level and file
//! - [`MetricsConfig`] - periodic stats logging
//!
//! ## Usage
//!
//! ```rust,no_run
//! use maildisplay::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Broker: {}:{}", config.mqtt.host, config.mqtt.port);
//!     Config::create_default("config.example.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [radio]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! format = "primary"
//!
//! [mqtt]
//! host = "broker.local"
//! port = 1883
//! topic = "homeassistant/sensor/mailbox"
//! ```
//!
//! Missing optional sections fall back to defaults; `[mqtt]` is required.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::telemetry::interpreter::DEFAULT_MAIL_THRESHOLD;
use crate::telemetry::PayloadFormat;
use crate::validation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub actuator: ActuatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub name: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: "maildisplay".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Serial device of the radio module. Empty runs without a radio.
    pub port: String,
    pub baud_rate: u32,
    #[serde(default)]
    pub format: PayloadFormat,
    /// Inter-byte silence after which a partial frame is flushed (ms).
    #[serde(default = "default_frame_gap_ms")]
    pub frame_gap_ms: u64,
}

fn default_frame_gap_ms() -> u64 {
    200
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            format: PayloadFormat::Primary,
            frame_gap_ms: default_frame_gap_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Proximity count at or above which mail is present.
    pub mail_threshold: u16,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            mail_threshold: DEFAULT_MAIL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Base topic; state goes to `<topic>/state`, discovery to `<topic>_<channel>/config`.
    pub topic: String,
    /// Client identifier. Generated as `maildisplay-XXXXXX` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Upper bound for a single connect attempt (ms).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Publish discovery documents with the retain flag.
    #[serde(default = "default_retain_discovery")]
    pub retain_discovery: bool,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_retain_discovery() -> bool {
    true
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_mqtt_port(),
            topic: "homeassistant/sensor/mailbox".to_string(),
            client_id: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retain_discovery: default_retain_discovery(),
        }
    }
}

impl MqttConfig {
    /// Configured client id, or a random `maildisplay-XXXXXX` one.
    pub fn effective_client_id(&self) -> String {
        match self.client_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("maildisplay-{:06X}", rand::random::<u32>() & 0xFF_FFFF),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HeartbeatConfig {
    /// Override of the per-format default period (300s primary, 3s alternate).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

impl HeartbeatConfig {
    pub fn period(&self, format: PayloadFormat) -> Duration {
        match self.interval_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => format.default_heartbeat(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// Log positions only (no hardware attached).
    #[default]
    Log,
    /// Linux sysfs PWM channel driving a hobby servo.
    Pwm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    #[serde(default)]
    pub kind: ActuatorKind,
    /// sysfs PWM channel directory, e.g. `/sys/class/pwm/pwmchip0/pwm0`.
    pub pwm_path: String,
    pub stowed_angle: u16,
    pub deployed_angle: u16,
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            kind: ActuatorKind::Log,
            pwm_path: "/sys/class/pwm/pwmchip0/pwm0".to_string(),
            stowed_angle: 0,
            deployed_angle: 90,
            min_pulse_us: 500,
            max_pulse_us: 2400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed level; unknown strings fall back to info.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Interval for periodic stats logging (0 disables).
    pub stats_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: 600,
        }
    }
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let mut config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Validate and normalise (trim) user-supplied values.
    pub fn validate(&mut self) -> Result<()> {
        self.mqtt.topic = validation::validate_topic(&self.mqtt.topic)?;
        self.mqtt.host = validation::validate_server(&self.mqtt.host)?;
        if self.mqtt.port == 0 {
            return Err(validation::ValidationError::ZeroPort.into());
        }
        if self.mqtt.keep_alive_secs < 5 {
            return Err(validation::ValidationError::KeepAliveTooShort {
                secs: self.mqtt.keep_alive_secs,
            }
            .into());
        }
        validation::validate_angle(self.actuator.stowed_angle)?;
        validation::validate_angle(self.actuator.deployed_angle)?;
        validation::validate_pulse_range(self.actuator.min_pulse_us, self.actuator.max_pulse_us)?;
        Ok(())
    }

    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat.period(self.radio.format)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            station: StationConfig::default(),
            radio: RadioConfig::default(),
            interpreter: InterpreterConfig::default(),
            mqtt: MqttConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            actuator: ActuatorConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [mqtt]
            host = "broker.local"
            topic = "mail"
            "#,
        )
        .unwrap();
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.radio.format, PayloadFormat::Primary);
        assert_eq!(config.interpreter.mail_threshold, 100);
        assert_eq!(config.actuator.deployed_angle, 90);
        assert!(config.mqtt.retain_discovery);
        assert_eq!(config.heartbeat_period(), Duration::from_secs(300));
    }

    #[test]
    fn alternate_format_changes_heartbeat_default() {
        let config = Config::from_toml(
            r#"
            [radio]
            port = "/dev/ttyS0"
            baud_rate = 9600
            format = "alternate"

            [mqtt]
            host = "broker.local"
            topic = "mail"
            "#,
        )
        .unwrap();
        assert_eq!(config.heartbeat_period(), Duration::from_secs(3));

        let hb = HeartbeatConfig {
            interval_secs: Some(60),
        };
        assert_eq!(hb.period(PayloadFormat::Alternate), Duration::from_secs(60));
    }

    #[test]
    fn validate_trims_and_rejects() {
        let mut config = Config::default();
        config.mqtt.topic = "  mail  ".to_string();
        config.validate().unwrap();
        assert_eq!(config.mqtt.topic, "mail");

        config.mqtt.topic = "mail/#".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.actuator.deployed_angle = 270;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mqtt.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn client_id_generation() {
        let mut mqtt = MqttConfig::default();
        let generated = mqtt.effective_client_id();
        assert!(generated.starts_with("maildisplay-"));
        assert_eq!(generated.len(), "maildisplay-".len() + 6);

        mqtt.client_id = Some("mailbox-base".to_string());
        assert_eq!(mqtt.effective_client_id(), "mailbox-base");
    }

    #[test]
    fn logging_level_parse() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
        logging.level = "debug".to_string();
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
        logging.level = "loud".to_string();
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
    }
}
