//! Configuration value validation for broker topics, hosts, and actuator ranges

/// Maximum base topic length accepted from configuration.
pub const MAX_TOPIC_LENGTH: usize = 40;

/// Maximum broker hostname length accepted from configuration.
pub const MAX_SERVER_LENGTH: usize = 30;

/// Validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("MQTT topic must not be empty")]
    EmptyTopic,

    #[error("MQTT topic is too long (maximum {max} characters)")]
    TopicTooLong { max: usize },

    #[error("MQTT topic must not contain wildcards (+ or #)")]
    TopicWildcard,

    #[error("MQTT topic must not start or end with '/'")]
    TopicSlash,

    #[error("MQTT topic contains control or NUL characters")]
    TopicControlChars,

    #[error("MQTT server must not be empty")]
    EmptyServer,

    #[error("MQTT server is too long (maximum {max} characters)")]
    ServerTooLong { max: usize },

    #[error("MQTT server contains invalid characters: {chars}")]
    ServerInvalidCharacters { chars: String },

    #[error("MQTT port must be non-zero")]
    ZeroPort,

    #[error("MQTT keep-alive must be at least 5 seconds (got {secs})")]
    KeepAliveTooShort { secs: u64 },

    #[error("Servo angle {angle} is outside 0..=180")]
    AngleOutOfRange { angle: u16 },

    #[error("Servo pulse range invalid: min {min}us must be below max {max}us")]
    PulseRange { min: u32, max: u32 },
}

/// Validate the base topic prefix. Returns the trimmed topic.
pub fn validate_topic(topic: &str) -> Result<String, ValidationError> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    if trimmed.chars().count() > MAX_TOPIC_LENGTH {
        return Err(ValidationError::TopicTooLong {
            max: MAX_TOPIC_LENGTH,
        });
    }
    if trimmed.contains('+') || trimmed.contains('#') {
        return Err(ValidationError::TopicWildcard);
    }
    if trimmed.starts_with('/') || trimmed.ends_with('/') {
        return Err(ValidationError::TopicSlash);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::TopicControlChars);
    }
    Ok(trimmed.to_string())
}

/// Validate a broker hostname or IP literal. Returns the trimmed host.
pub fn validate_server(server: &str) -> Result<String, ValidationError> {
    let trimmed = server.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyServer);
    }
    if trimmed.len() > MAX_SERVER_LENGTH {
        return Err(ValidationError::ServerTooLong {
            max: MAX_SERVER_LENGTH,
        });
    }
    let invalid: String = trimmed
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':')))
        .collect();
    if !invalid.is_empty() {
        return Err(ValidationError::ServerInvalidCharacters { chars: invalid });
    }
    Ok(trimmed.to_string())
}

pub fn validate_angle(angle: u16) -> Result<u16, ValidationError> {
    if angle > 180 {
        return Err(ValidationError::AngleOutOfRange { angle });
    }
    Ok(angle)
}

pub fn validate_pulse_range(min_us: u32, max_us: u32) -> Result<(), ValidationError> {
    if min_us >= max_us {
        return Err(ValidationError::PulseRange {
            min: min_us,
            max: max_us,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_topics() {
        assert_eq!(
            validate_topic(" homeassistant/sensor/mailbox ").unwrap(),
            "homeassistant/sensor/mailbox"
        );
        assert!(validate_topic("mail").is_ok());
    }

    #[test]
    fn invalid_topics() {
        assert_eq!(validate_topic("  "), Err(ValidationError::EmptyTopic));
        assert_eq!(validate_topic("mail/#"), Err(ValidationError::TopicWildcard));
        assert_eq!(validate_topic("mail/+/x"), Err(ValidationError::TopicWildcard));
        assert_eq!(validate_topic("mail/"), Err(ValidationError::TopicSlash));
        assert_eq!(
            validate_topic(&"a".repeat(41)),
            Err(ValidationError::TopicTooLong { max: 40 })
        );
        assert_eq!(
            validate_topic("mail\u{0}box"),
            Err(ValidationError::TopicControlChars)
        );
    }

    #[test]
    fn servers() {
        assert!(validate_server("broker.local").is_ok());
        assert!(validate_server("192.168.1.10").is_ok());
        assert_eq!(validate_server(""), Err(ValidationError::EmptyServer));
        assert!(matches!(
            validate_server("bad host!"),
            Err(ValidationError::ServerInvalidCharacters { .. })
        ));
    }

    #[test]
    fn actuator_ranges() {
        assert!(validate_angle(180).is_ok());
        assert!(validate_angle(181).is_err());
        assert!(validate_pulse_range(500, 2400).is_ok());
        assert!(validate_pulse_range(2400, 500).is_err());
    }
}
