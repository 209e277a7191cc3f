//! Time-based escalation policy.
//!
//! The policy is a pure function of a channel's severity, acknowledgment,
//! time since it entered that severity and time since it last fired.
//!
//! | Severity | Awareness | Persistence          | Neglect             |
//! |----------|-----------|----------------------|---------------------|
//! | Critical | ≤ 7s      | ≤ 20s, every 4s      | > 20s, every 2s     |
//! | Warning  | ≤ 10s     | ≤ 30s, every 6s      | > 30s, every 3s     |
//!
//! Awareness fires once per episode. Persistence and neglect re-fire at their
//! interval, measured from the last fire rather than from phase entry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, Result};
use crate::types::{EscalationPhase, Severity};

/// Phase boundaries and re-fire intervals for one severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// Time in severity after which persistence begins (milliseconds).
    pub persistence_after_ms: u64,
    /// Time in severity after which neglect begins (milliseconds).
    pub neglect_after_ms: u64,
    /// Minimum gap between persistence fires (milliseconds).
    pub persistence_interval_ms: u64,
    /// Minimum gap between neglect fires (milliseconds).
    pub neglect_interval_ms: u64,
}

impl PhaseTimings {
    /// Default timings for critical channels.
    pub const CRITICAL: Self = Self {
        persistence_after_ms: 7_000,
        neglect_after_ms: 20_000,
        persistence_interval_ms: 4_000,
        neglect_interval_ms: 2_000,
    };

    /// Default timings for warning channels.
    pub const WARNING: Self = Self {
        persistence_after_ms: 10_000,
        neglect_after_ms: 30_000,
        persistence_interval_ms: 6_000,
        neglect_interval_ms: 3_000,
    };

    /// Returns the phase reached after `elapsed` in the severity.
    #[must_use]
    pub const fn phase_after(&self, elapsed: Duration) -> EscalationPhase {
        let elapsed_ms = elapsed.as_millis();
        if elapsed_ms > self.neglect_after_ms as u128 {
            EscalationPhase::Neglect
        } else if elapsed_ms > self.persistence_after_ms as u128 {
            EscalationPhase::Persistence
        } else {
            EscalationPhase::Awareness
        }
    }

    /// Returns the re-fire interval for a phase; `None` means the phase does not repeat.
    #[must_use]
    pub const fn interval(&self, phase: EscalationPhase) -> Option<Duration> {
        match phase {
            EscalationPhase::Persistence => {
                Some(Duration::from_millis(self.persistence_interval_ms))
            }
            EscalationPhase::Neglect => Some(Duration::from_millis(self.neglect_interval_ms)),
            EscalationPhase::None | EscalationPhase::Awareness => None,
        }
    }

    fn validate(&self, label: &str) -> Result<()> {
        if self.persistence_after_ms >= self.neglect_after_ms {
            return Err(AlarmError::InvalidConfig {
                reason: format!("{label}: persistence must begin before neglect"),
            });
        }
        if self.persistence_interval_ms == 0 || self.neglect_interval_ms == 0 {
            return Err(AlarmError::InvalidConfig {
                reason: format!("{label}: re-fire intervals must be non-zero"),
            });
        }
        Ok(())
    }
}

/// The outcome of evaluating the policy for one channel at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    /// The phase the channel is in.
    pub phase: EscalationPhase,
    /// Whether a fire event is due now.
    pub fire: bool,
}

impl PolicyDecision {
    const QUIET: Self = Self {
        phase: EscalationPhase::None,
        fire: false,
    };
}

/// Escalation timings for warning and critical channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationPolicy {
    /// Timings applied while a channel is warning.
    pub warning: PhaseTimings,
    /// Timings applied while a channel is critical.
    pub critical: PhaseTimings,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            warning: PhaseTimings::WARNING,
            critical: PhaseTimings::CRITICAL,
        }
    }
}

impl EscalationPolicy {
    /// Checks that both timing sets are usable.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::InvalidConfig` if a phase boundary or interval is invalid.
    pub fn validate(&self) -> Result<()> {
        self.warning.validate("warning")?;
        self.critical.validate("critical")
    }

    /// Returns the timings for an abnormal severity.
    #[must_use]
    pub const fn timings(&self, severity: Severity) -> Option<&PhaseTimings> {
        match severity {
            Severity::Normal => None,
            Severity::Warning => Some(&self.warning),
            Severity::Critical => Some(&self.critical),
        }
    }

    /// Returns the escalation phase for a channel.
    ///
    /// Normal or acknowledged channels are never escalating.
    #[must_use]
    pub fn phase(
        &self,
        severity: Severity,
        acknowledged: bool,
        in_severity: Duration,
    ) -> EscalationPhase {
        if acknowledged {
            return EscalationPhase::None;
        }
        self.timings(severity)
            .map_or(EscalationPhase::None, |t| t.phase_after(in_severity))
    }

    /// Evaluates phase and fire decision at `now`.
    ///
    /// `entered_at` is when the channel entered its current severity and
    /// `last_fired_at` when it last fired during this episode.
    #[must_use]
    pub fn evaluate(
        &self,
        severity: Severity,
        acknowledged: bool,
        entered_at: Option<DateTime<Utc>>,
        last_fired_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> PolicyDecision {
        let (Some(timings), Some(entered_at)) = (self.timings(severity), entered_at) else {
            return PolicyDecision::QUIET;
        };
        if acknowledged {
            return PolicyDecision::QUIET;
        }

        let phase = timings.phase_after(elapsed(entered_at, now));
        let fire = match (timings.interval(phase), last_fired_at) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(interval), Some(last)) => elapsed(last, now) >= interval,
        };

        PolicyDecision { phase, fire }
    }
}

/// Time from `since` to `now`, clamped at zero.
pub(crate) fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or_default()
}
