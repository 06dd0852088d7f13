//! State payload formatting.
//!
//! Payloads are written by hand rather than through `serde_json` because
//! consumers rely on fixed precision (`3.00` volts, `32.0` °C).
use std::fmt::Write;

use crate::telemetry::{InterpretedState, PayloadFormat};

/// Why a state message is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Station just came up; carries the cached (usually sentinel) state.
    Start,
    /// Periodic liveness; carries the cached state.
    Heartbeat,
    /// New radio frame.
    Update,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Start => "START",
            Lifecycle::Heartbeat => "HB",
            Lifecycle::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body for `<topic>/state`. The alternate sensor carries no lifecycle
/// tag and no temperature.
pub fn state_payload(format: PayloadFormat, lifecycle: Lifecycle, state: &InterpretedState) -> String {
    let mut out = String::with_capacity(128);
    match format {
        PayloadFormat::Primary => {
            let _ = write!(
                out,
                "{{\"lifecycle\":\"{}\",\"mailproximity\":{},\"status\":\"{}\",\"battery\":{:.2},\"temperature\":",
                lifecycle,
                state.proximity,
                state.status,
                state.battery_volts
            );
            match state.temperature_c {
                Some(t) => {
                    let _ = write!(out, "{:.1}", t);
                }
                None => out.push_str("null"),
            }
            out.push('}');
        }
        PayloadFormat::Alternate => {
            let _ = write!(
                out,
                "{{\"mailProximity\":{},\"flagADC\":{},\"battery\":{:.2}}}",
                state.proximity,
                state.flag_adc.unwrap_or(0),
                state.battery_volts
            );
        }
    }
    out
}
