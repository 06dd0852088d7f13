//! Home Assistant MQTT discovery documents.
//!
//! One static document per telemetry channel, each pointing at the shared
//! `<topic>/state` payload with a template that extracts its field.
use serde::Serialize;

use crate::telemetry::PayloadFormat;

/// Static description of one discoverable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// Topic suffix token: `<topic>_<key>/config`.
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: Option<&'static str>,
    pub unit: Option<&'static str>,
    /// Field of the state payload the value template reads.
    pub field: &'static str,
}

const PRIMARY_CHANNELS: &[Channel] = &[
    Channel {
        key: "temperature",
        name: "Mail_Temperature",
        device_class: Some("temperature"),
        unit: Some("°C"),
        field: "temperature",
    },
    Channel {
        key: "proximity",
        name: "Mail_Proximity",
        device_class: None,
        unit: Some("Count"),
        field: "mailproximity",
    },
    Channel {
        key: "status",
        name: "Mail_Status",
        device_class: None,
        unit: None,
        field: "status",
    },
    Channel {
        key: "battery",
        name: "Mail_Battery",
        device_class: None,
        unit: Some("V"),
        field: "battery",
    },
    Channel {
        key: "lifecycle",
        name: "Mail_Lifecycle",
        device_class: None,
        unit: Some(""),
        field: "lifecycle",
    },
];

// The flag sensor has no thermometer, so no temperature channel.
const ALTERNATE_CHANNELS: &[Channel] = &[
    Channel {
        key: "proximity",
        name: "Mail_Proximity",
        device_class: None,
        unit: Some("Count"),
        field: "mailProximity",
    },
    Channel {
        key: "flag",
        name: "Mail_Flag_ADC",
        device_class: None,
        unit: Some("Count"),
        field: "flagADC",
    },
    Channel {
        key: "battery",
        name: "Mail_Battery",
        device_class: None,
        unit: Some("V"),
        field: "battery",
    },
];

/// Channels announced for a payload format.
pub fn channels(format: PayloadFormat) -> &'static [Channel] {
    match format {
        PayloadFormat::Primary => PRIMARY_CHANNELS,
        PayloadFormat::Alternate => ALTERNATE_CHANNELS,
    }
}

#[derive(Debug, Serialize)]
struct DiscoveryDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    name: &'a str,
    state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    value_template: String,
}

/// A rendered discovery message ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub topic: String,
    pub payload: String,
}

pub fn config_topic(base_topic: &str, channel: &Channel) -> String {
    format!("{}_{}/config", base_topic, channel.key)
}

pub fn state_topic(base_topic: &str) -> String {
    format!("{}/state", base_topic)
}

/// Render every discovery document for `format` under `base_topic`.
pub fn announcements(format: PayloadFormat, base_topic: &str) -> Vec<Announcement> {
    let state_topic = state_topic(base_topic);
    channels(format)
        .iter()
        .map(|channel| {
            let doc = DiscoveryDocument {
                device_class: channel.device_class,
                name: channel.name,
                state_topic: state_topic.clone(),
                unit_of_measurement: channel.unit,
                value_template: format!("{{{{ value_json.{}}}}}", channel.field),
            };
            Announcement {
                topic: config_topic(base_topic, channel),
                // Serializing a struct of strings cannot fail.
                payload: serde_json::to_string(&doc).unwrap_or_default(),
            }
        })
        .collect()
}
