//! Fixed-size radio frame decoding.
//!
//! Every byte pattern is a legal reading; the only failure is a frame that is
//! too short for the configured [`PayloadFormat`].
use thiserror::Error;

use super::PayloadFormat;

/// Errors produced while decoding a radio frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame ended before all fields of the format were present.
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Raw fields as transmitted by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorReading {
    Proximity {
        proximity: u16,
        battery_raw: u8,
        temperature_raw: u8,
    },
    FlagBattery {
        mail_flag: bool,
        /// 7-bit level (0..=127)
        battery_level: u8,
        reserved: [u8; 2],
    },
}

impl SensorReading {
    /// Packed byte as it appeared on the wire for the alternate format.
    pub fn packed_flag_byte(&self) -> Option<u8> {
        match *self {
            SensorReading::FlagBattery {
                mail_flag,
                battery_level,
                ..
            } => Some(((mail_flag as u8) << 7) | (battery_level & 0x7F)),
            SensorReading::Proximity { .. } => None,
        }
    }
}

/// Decode a frame. Bytes beyond the format's length are ignored.
pub fn decode(format: PayloadFormat, frame: &[u8]) -> Result<SensorReading, FrameError> {
    let expected = format.frame_len();
    if frame.len() < expected {
        return Err(FrameError::Length {
            expected,
            actual: frame.len(),
        });
    }
    let reading = match format {
        PayloadFormat::Primary => SensorReading::Proximity {
            proximity: u16::from_le_bytes([frame[0], frame[1]]),
            battery_raw: frame[2],
            temperature_raw: frame[3],
        },
        PayloadFormat::Alternate => SensorReading::FlagBattery {
            mail_flag: frame[0] & 0x80 != 0,
            battery_level: frame[0] & 0x7F,
            reserved: [frame[1], frame[2]],
        },
    };
    Ok(reading)
}
