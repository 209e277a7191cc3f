//! Error types for the vital-alarms crate.
//!
//! Tick evaluation and the control API never fail; these errors only surface
//! while building an engine (configuration, channel registration) and from
//! sinks refusing an event.

use thiserror::Error;

/// Errors that can occur while configuring or wiring the alarm engine.
#[derive(Debug, Error)]
pub enum AlarmError {
    /// Invalid engine or policy configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// A channel with the given name is already registered.
    #[error("channel already registered: {name}")]
    DuplicateChannel {
        /// The duplicated channel name.
        name: String,
    },

    /// The channel name cannot be used.
    #[error("invalid channel name: {reason}")]
    InvalidChannel {
        /// The reason the name was rejected.
        reason: String,
    },

    /// A sink could not deliver a fire event.
    #[error("sink failed: {reason}")]
    SinkFailed {
        /// The reason delivery failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AlarmError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for alarm engine operations.
pub type Result<T> = std::result::Result<T, AlarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_config() {
        let err = AlarmError::InvalidConfig {
            reason: "tick interval must be non-zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration: tick interval must be non-zero"
        );
    }

    #[test]
    fn error_display_duplicate_channel() {
        let err = AlarmError::DuplicateChannel {
            name: "hr".to_string(),
        };
        assert_eq!(err.to_string(), "channel already registered: hr");
    }

    #[test]
    fn error_display_invalid_channel() {
        let err = AlarmError::InvalidChannel {
            reason: "empty name".to_string(),
        };
        assert_eq!(err.to_string(), "invalid channel name: empty name");
    }

    #[test]
    fn error_display_sink_failed() {
        let err = AlarmError::SinkFailed {
            reason: "audio device busy".to_string(),
        };
        assert_eq!(err.to_string(), "sink failed: audio device busy");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("invalid json");
        assert!(json_err.is_err());
        let alarm_err: AlarmError = json_err.unwrap_err().into();
        assert!(matches!(alarm_err, AlarmError::SerializationError(_)));
    }
}
