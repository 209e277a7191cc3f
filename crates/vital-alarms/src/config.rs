//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AlarmError, Result};
use crate::policy::EscalationPolicy;

/// Configuration for the alarm engine.
///
/// Every field has a default, so partial JSON such as `{"sustain_ms": 3000}`
/// is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Master switch; a disabled engine ignores ticks.
    pub enabled: bool,
    /// How often the ticker evaluates all channels (milliseconds).
    pub tick_interval_ms: u64,
    /// How long an abnormal reading must persist before a normal channel
    /// enters it (milliseconds). Zero enters immediately.
    pub sustain_ms: u64,
    /// Escalation timings.
    pub policy: EscalationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: 500,
            sustain_ms: 0,
            policy: EscalationPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::SerializationError` for malformed JSON and
    /// `AlarmError::InvalidConfig` if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        debug!(
            enabled = config.enabled,
            tick_interval_ms = config.tick_interval_ms,
            sustain_ms = config.sustain_ms,
            "loaded engine configuration"
        );
        Ok(config)
    }

    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::InvalidConfig` if the tick interval is zero or the
    /// policy timings are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(AlarmError::InvalidConfig {
                reason: "tick interval must be non-zero".to_string(),
            });
        }
        self.policy.validate()
    }

    /// Returns the tick interval.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Returns the sustain window.
    #[must_use]
    pub const fn sustain(&self) -> Duration {
        Duration::from_millis(self.sustain_ms)
    }
}
