//! # Telemetry Pipeline
//!
//! Turns raw radio frames from the mailbox sensor into broker-facing state.
//!
//! ```text
//! frame bytes ──► decoder ──► SensorReading ──► interpreter ──► InterpretedState
//!                                                                   │
//!                                           cache (last known) ◄────┘
//! ```
//!
//! Two sensor hardware revisions exist in the field. They differ in frame
//! shape, battery calibration, and the JSON schema consumers expect, so the
//! whole pipeline is parameterised by [`PayloadFormat`] instead of carrying two
//! copies of the logic.
//!
//! - [`decoder`] - fixed-size frame parsing
//! - [`interpreter`] - status classification and unit scaling
//! - [`cache`] - last published reading for heartbeat re-emission

pub mod cache;
pub mod decoder;
pub mod interpreter;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use cache::StateCache;
pub use decoder::{decode, FrameError, SensorReading};
pub use interpreter::{InterpretedState, Interpreter, MailStatus};

/// Radio payload layout, selected per sensor hardware revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// 4 bytes: little-endian proximity word, battery byte, temperature byte.
    #[default]
    Primary,
    /// 3 bytes: packed mail flag (bit 7) + 7-bit battery level, two reserved bytes.
    Alternate,
}

impl PayloadFormat {
    /// Number of bytes the sensor transmits per frame.
    pub fn frame_len(&self) -> usize {
        match self {
            PayloadFormat::Primary => 4,
            PayloadFormat::Alternate => 3,
        }
    }

    /// Battery calibration offset added to the raw value before dividing by 100.
    ///
    /// The revisions use different divider resistors; the constants are not
    /// interchangeable.
    pub fn battery_offset(&self) -> f64 {
        match self {
            PayloadFormat::Primary => 200.0,
            PayloadFormat::Alternate => 150.0,
        }
    }

    /// Default heartbeat period. The alternate sensor has no liveness frames of
    /// its own so its base station republishes state every few seconds.
    pub fn default_heartbeat(&self) -> Duration {
        match self {
            PayloadFormat::Primary => Duration::from_secs(300),
            PayloadFormat::Alternate => Duration::from_secs(3),
        }
    }

    /// Parse from a string (case-insensitive). Accepts the same names as the
    /// `[radio] format` config key.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "primary" => Some(PayloadFormat::Primary),
            "alternate" => Some(PayloadFormat::Alternate),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadFormat::Primary => write!(f, "primary"),
            PayloadFormat::Alternate => write!(f, "alternate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse_matches_config_names() {
        assert_eq!(PayloadFormat::parse("Primary"), Some(PayloadFormat::Primary));
        assert_eq!(PayloadFormat::parse("ALTERNATE"), Some(PayloadFormat::Alternate));
        assert_eq!(PayloadFormat::parse("flag"), None);
        assert_eq!(PayloadFormat::parse("v1"), None);

        for format in [PayloadFormat::Primary, PayloadFormat::Alternate] {
            let config_name = serde_json::to_value(format).unwrap();
            assert_eq!(PayloadFormat::parse(config_name.as_str().unwrap()), Some(format));
            assert_eq!(PayloadFormat::parse(&format.to_string()), Some(format));
        }
    }

    #[test]
    fn heartbeat_defaults_differ_per_revision() {
        assert_eq!(
            PayloadFormat::Primary.default_heartbeat(),
            Duration::from_secs(300)
        );
        assert_eq!(
            PayloadFormat::Alternate.default_heartbeat(),
            Duration::from_secs(3)
        );
    }
}
