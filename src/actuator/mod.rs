//! # Flag Actuator
//!
//! Drives the mailbox flag indicator. Every reading collapses to one of two
//! physical positions: raised when mail is present, stowed otherwise
//! (including an open door and the unknown startup state).
//!
//! Commands are fire-and-forget. There is no position feedback from a hobby
//! servo, so a failed write is logged and the next reading tries again.
//!
//! Backends:
//! - [`LogActuator`] - logs positions, for bench setups without a servo
//! - [`PwmServo`] - Linux sysfs PWM channel (`/sys/class/pwm/pwmchipN/pwmM`)

use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{ActuatorConfig, ActuatorKind};
use crate::telemetry::MailStatus;

/// Standard hobby servo frame period (20 ms).
pub const SERVO_PERIOD_NS: u64 = 20_000_000;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid PWM channel path {0}")]
    InvalidChannel(PathBuf),
}

/// Something that can hold an angle in degrees (0..=180).
pub trait FlagActuator {
    fn set_angle(&mut self, angle: u16) -> Result<(), ActuatorError>;
}

impl FlagActuator for Box<dyn FlagActuator + Send> {
    fn set_angle(&mut self, angle: u16) -> Result<(), ActuatorError> {
        (**self).set_angle(angle)
    }
}

#[derive(Debug, Default)]
pub struct LogActuator {
    last: Option<u16>,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_angle(&self) -> Option<u16> {
        self.last
    }
}

impl FlagActuator for LogActuator {
    fn set_angle(&mut self, angle: u16) -> Result<(), ActuatorError> {
        debug!("Flag servo -> {} deg (no hardware)", angle);
        self.last = Some(angle);
        Ok(())
    }
}

/// Servo on a sysfs PWM channel. Pulse width is linear in angle between
/// `min_pulse_us` (0 deg) and `max_pulse_us` (180 deg).
#[derive(Debug)]
pub struct PwmServo {
    channel: PathBuf,
    min_pulse_us: u32,
    max_pulse_us: u32,
}

impl PwmServo {
    /// Export the channel if needed, set the 20 ms period and enable output.
    pub fn open(
        channel: impl AsRef<Path>,
        min_pulse_us: u32,
        max_pulse_us: u32,
    ) -> Result<Self, ActuatorError> {
        let channel = channel.as_ref().to_path_buf();
        if !channel.exists() {
            export_channel(&channel)?;
        }
        let servo = Self {
            channel,
            min_pulse_us,
            max_pulse_us,
        };
        servo.write_attr("period", &SERVO_PERIOD_NS.to_string())?;
        servo.write_attr("enable", "1")?;
        info!("PWM servo ready on {}", servo.channel.display());
        Ok(servo)
    }

    /// Pulse width in microseconds for `angle`, clamped to 180 deg.
    pub fn pulse_us(&self, angle: u16) -> u32 {
        let angle = u32::from(angle.min(180));
        self.min_pulse_us + (self.max_pulse_us - self.min_pulse_us) * angle / 180
    }

    fn write_attr(&self, attr: &str, value: &str) -> Result<(), ActuatorError> {
        let path = self.channel.join(attr);
        fs::write(&path, value).map_err(|source| ActuatorError::Write { path, source })
    }
}

impl FlagActuator for PwmServo {
    fn set_angle(&mut self, angle: u16) -> Result<(), ActuatorError> {
        let duty_ns = u64::from(self.pulse_us(angle)) * 1000;
        self.write_attr("duty_cycle", &duty_ns.to_string())
    }
}

/// `/sys/class/pwm/pwmchip0/pwm1` is exported by writing `1` to
/// `/sys/class/pwm/pwmchip0/export`.
fn export_channel(channel: &Path) -> Result<(), ActuatorError> {
    let index = channel
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("pwm"))
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| ActuatorError::InvalidChannel(channel.to_path_buf()))?;
    let chip = channel
        .parent()
        .ok_or_else(|| ActuatorError::InvalidChannel(channel.to_path_buf()))?;
    let export = chip.join("export");
    fs::write(&export, index.to_string()).map_err(|source| ActuatorError::Write {
        path: export,
        source,
    })
}

/// Build the configured backend. A PWM channel that cannot be opened falls
/// back to logging so the rest of the station keeps running.
pub fn from_config(cfg: &ActuatorConfig) -> Box<dyn FlagActuator + Send> {
    match cfg.kind {
        ActuatorKind::Log => Box::new(LogActuator::new()),
        ActuatorKind::Pwm => match PwmServo::open(&cfg.pwm_path, cfg.min_pulse_us, cfg.max_pulse_us) {
            Ok(servo) => Box::new(servo),
            Err(e) => {
                warn!("PWM servo unavailable ({}), flag positions will only be logged", e);
                Box::new(LogActuator::new())
            }
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagPosition {
    Stowed,
    Deployed,
}

impl FlagPosition {
    pub fn for_status(status: MailStatus) -> Self {
        match status {
            MailStatus::Mail => FlagPosition::Deployed,
            MailStatus::NoMail | MailStatus::Open | MailStatus::Unknown => FlagPosition::Stowed,
        }
    }
}

/// Maps mail status to the two flag angles.
pub struct FlagDriver<A: FlagActuator> {
    actuator: A,
    stowed_angle: u16,
    deployed_angle: u16,
    position: Option<FlagPosition>,
}

impl<A: FlagActuator> FlagDriver<A> {
    pub fn new(actuator: A, stowed_angle: u16, deployed_angle: u16) -> Self {
        Self {
            actuator,
            stowed_angle,
            deployed_angle,
            position: None,
        }
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Last commanded position, `None` before the first command.
    pub fn position(&self) -> Option<FlagPosition> {
        self.position
    }

    /// Change the two angles; applied on the next command.
    pub fn set_angles(&mut self, stowed_angle: u16, deployed_angle: u16) {
        self.stowed_angle = stowed_angle;
        self.deployed_angle = deployed_angle;
    }

    pub fn stow(&mut self) {
        self.command(FlagPosition::Stowed);
    }

    /// Command the flag for `status`. Repeating a status re-sends the same
    /// angle, which is harmless.
    pub fn set_position(&mut self, status: MailStatus) {
        self.command(FlagPosition::for_status(status));
    }

    fn command(&mut self, position: FlagPosition) {
        let angle = match position {
            FlagPosition::Stowed => self.stowed_angle,
            FlagPosition::Deployed => self.deployed_angle,
        };
        if self.position != Some(position) {
            info!("Flag {:?} ({} deg)", position, angle);
        }
        if let Err(e) = self.actuator.set_angle(angle) {
            warn!("Flag actuator command failed: {}", e);
        }
        self.position = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        angles: Vec<u16>,
        fail: bool,
    }

    impl FlagActuator for Recorder {
        fn set_angle(&mut self, angle: u16) -> Result<(), ActuatorError> {
            self.angles.push(angle);
            if self.fail {
                return Err(ActuatorError::InvalidChannel(PathBuf::from("/nowhere")));
            }
            Ok(())
        }
    }

    #[test]
    fn status_maps_to_two_positions() {
        let mut driver = FlagDriver::new(Recorder::default(), 0, 90);
        driver.set_position(MailStatus::Mail);
        driver.set_position(MailStatus::NoMail);
        driver.set_position(MailStatus::Open);
        driver.set_position(MailStatus::Unknown);
        assert_eq!(driver.actuator().angles, vec![90, 0, 0, 0]);
        assert_eq!(driver.position(), Some(FlagPosition::Stowed));
    }

    #[test]
    fn repeated_status_is_harmless() {
        let mut driver = FlagDriver::new(Recorder::default(), 10, 120);
        driver.set_position(MailStatus::Mail);
        driver.set_position(MailStatus::Mail);
        assert_eq!(driver.actuator().angles, vec![120, 120]);
        assert_eq!(driver.position(), Some(FlagPosition::Deployed));
    }

    #[test]
    fn failures_are_swallowed() {
        let recorder = Recorder {
            fail: true,
            ..Default::default()
        };
        let mut driver = FlagDriver::new(recorder, 0, 90);
        driver.set_position(MailStatus::Mail);
        assert_eq!(driver.position(), Some(FlagPosition::Deployed));
    }

    #[test]
    fn pwm_servo_writes_sysfs_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let channel = dir.path().join("pwm0");
        std::fs::create_dir(&channel).unwrap();

        let mut servo = PwmServo::open(&channel, 500, 2400).unwrap();
        assert_eq!(
            std::fs::read_to_string(channel.join("period")).unwrap(),
            "20000000"
        );
        assert_eq!(std::fs::read_to_string(channel.join("enable")).unwrap(), "1");

        servo.set_angle(90).unwrap();
        assert_eq!(
            std::fs::read_to_string(channel.join("duty_cycle")).unwrap(),
            "1450000"
        );
        assert_eq!(servo.pulse_us(0), 500);
        assert_eq!(servo.pulse_us(180), 2400);
        assert_eq!(servo.pulse_us(300), 2400);
    }

    #[test]
    fn missing_channel_is_exported_through_chip() {
        let dir = tempfile::tempdir().unwrap();
        // Export succeeds but nothing creates the channel directory, so the
        // following attribute write fails.
        let err = PwmServo::open(dir.path().join("pwm3"), 500, 2400).unwrap_err();
        assert!(matches!(err, ActuatorError::Write { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("export")).unwrap(),
            "3"
        );
    }

    #[test]
    fn log_backend_is_the_fallback() {
        let cfg = ActuatorConfig {
            kind: ActuatorKind::Pwm,
            pwm_path: "/definitely/not/a/pwmchip/pwm0".to_string(),
            ..ActuatorConfig::default()
        };
        let mut actuator = from_config(&cfg);
        assert!(actuator.set_angle(45).is_ok());
    }
}
