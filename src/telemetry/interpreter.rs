//! Classification and unit scaling of decoded readings.
use super::{PayloadFormat, SensorReading};

/// Proximity value the sensor sends when it cannot take a measurement
/// (door open or sensor fault).
pub const PROXIMITY_NO_READING: u16 = 0xFFFF;

/// Default proximity count at or above which mail is considered present.
pub const DEFAULT_MAIL_THRESHOLD: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailStatus {
    /// Proximity below threshold: box is empty.
    NoMail,
    Mail,
    /// Sensor reported no reading (`0xFFFF`).
    Open,
    /// Nothing received since startup.
    Unknown,
}

impl MailStatus {
    /// Wire label used in state payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            MailStatus::NoMail => "NONE",
            MailStatus::Mail => "MAIL",
            MailStatus::Open => "OPEN",
            MailStatus::Unknown => "????",
        }
    }
}

impl std::fmt::Display for MailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker-facing values derived from one [`SensorReading`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpretedState {
    pub status: MailStatus,
    pub proximity: u16,
    pub battery_volts: f64,
    /// Absent for frames that carry no temperature byte.
    pub temperature_c: Option<f64>,
    /// Raw packed flag/battery byte (alternate format only).
    pub flag_adc: Option<u8>,
}

impl InterpretedState {
    /// Startup sentinel held by the cache until the first frame arrives.
    pub fn unknown() -> Self {
        Self {
            status: MailStatus::Unknown,
            proximity: PROXIMITY_NO_READING,
            battery_volts: 10.0,
            temperature_c: Some(-99.0),
            flag_adc: None,
        }
    }
}

impl Default for InterpretedState {
    fn default() -> Self {
        Self::unknown()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpreter {
    mail_threshold: u16,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_MAIL_THRESHOLD)
    }
}

impl Interpreter {
    pub fn new(mail_threshold: u16) -> Self {
        Self { mail_threshold }
    }

    pub fn mail_threshold(&self) -> u16 {
        self.mail_threshold
    }

    /// Threshold rule for proximity-reporting sensors. `Open` only ever comes
    /// from the no-reading sentinel, never from the comparison.
    pub fn classify(&self, proximity: u16) -> MailStatus {
        if proximity == PROXIMITY_NO_READING {
            MailStatus::Open
        } else if proximity < self.mail_threshold {
            MailStatus::NoMail
        } else {
            MailStatus::Mail
        }
    }

    pub fn interpret(&self, reading: &SensorReading) -> InterpretedState {
        match *reading {
            SensorReading::Proximity {
                proximity,
                battery_raw,
                temperature_raw,
            } => InterpretedState {
                status: self.classify(proximity),
                proximity,
                battery_volts: battery_volts(PayloadFormat::Primary, battery_raw),
                temperature_c: Some(temperature_celsius(temperature_raw)),
                flag_adc: None,
            },
            SensorReading::FlagBattery {
                mail_flag,
                battery_level,
                ..
            } => InterpretedState {
                status: if mail_flag {
                    MailStatus::Mail
                } else {
                    MailStatus::NoMail
                },
                proximity: mail_flag as u16,
                battery_volts: battery_volts(PayloadFormat::Alternate, battery_level),
                temperature_c: None,
                flag_adc: reading.packed_flag_byte(),
            },
        }
    }
}

/// `(raw + offset) / 100`, offset depending on hardware revision.
pub fn battery_volts(format: PayloadFormat, raw: u8) -> f64 {
    (raw as f64 + format.battery_offset()) / 100.0
}

/// `raw / 2 - 30`, half-degree steps from -30 °C.
pub fn temperature_celsius(raw: u8) -> f64 {
    raw as f64 / 2.0 - 30.0
}
