//! Per-channel alarm state.
//!
//! [`ChannelState`] records what the engine knows about one channel across
//! ticks: severity, acknowledgment, when each abnormal severity was entered
//! and when the channel last fired. Only the engine mutates it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::policy::elapsed;
use crate::types::{ChannelSnapshot, EscalationPhase, Reading, Severity};

/// What an observation did to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Severity unchanged.
    Unchanged,
    /// Abnormal reading seen but held back by the sustain window.
    Pending,
    /// Entered an abnormal severity (from normal or the other abnormal severity).
    Entered(Severity),
    /// Returned to normal.
    Cleared,
}

/// An abnormal reading waiting out the sustain window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PendingEntry {
    severity: Severity,
    since: DateTime<Utc>,
}

/// Mutable state of one monitored channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Channel name.
    pub name: String,
    /// Current severity.
    pub severity: Severity,
    /// Whether the current abnormality has been acknowledged.
    pub acknowledged: bool,
    /// When the channel last entered warning.
    pub warning_entered_at: Option<DateTime<Utc>>,
    /// When the channel last entered critical.
    pub critical_entered_at: Option<DateTime<Utc>>,
    /// When the channel last fired during the current episode.
    pub last_fired_at: Option<DateTime<Utc>>,
    /// Current escalation phase.
    pub escalation_phase: EscalationPhase,
    /// Last observed reading.
    pub current_value: Option<Reading>,
    pending: Option<PendingEntry>,
}

impl ChannelState {
    /// Creates a normal channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Normal,
            acknowledged: false,
            warning_entered_at: None,
            critical_entered_at: None,
            last_fired_at: None,
            escalation_phase: EscalationPhase::None,
            current_value: None,
            pending: None,
        }
    }

    /// Returns when the current severity was entered.
    #[must_use]
    pub const fn entered_at(&self) -> Option<DateTime<Utc>> {
        match self.severity {
            Severity::Normal => None,
            Severity::Warning => self.warning_entered_at,
            Severity::Critical => self.critical_entered_at,
        }
    }

    /// Returns true while an abnormal reading is waiting out the sustain window.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Applies one classified reading.
    ///
    /// Re-observing the current severity leaves the entry timestamp and
    /// acknowledgment alone. Entry from normal is delayed until the abnormal
    /// condition has held for `sustain`.
    pub fn observe(
        &mut self,
        severity: Severity,
        reading: Reading,
        now: DateTime<Utc>,
        sustain: Duration,
    ) -> Transition {
        self.current_value = Some(reading);

        if severity == self.severity {
            self.pending = None;
            return Transition::Unchanged;
        }

        if !severity.is_abnormal() {
            self.clear();
            return Transition::Cleared;
        }

        if self.severity == Severity::Normal && !sustain.is_zero() {
            let since = self.pending.map_or(now, |p| p.since);
            if elapsed(since, now) < sustain {
                self.pending = Some(PendingEntry { severity, since });
                debug!(
                    channel = %self.name,
                    severity = %severity,
                    value = %reading,
                    "abnormal reading within sustain window"
                );
                return Transition::Pending;
            }
        }

        self.enter(severity, now);
        Transition::Entered(severity)
    }

    fn enter(&mut self, severity: Severity, now: DateTime<Utc>) {
        let previous = self.severity;
        self.severity = severity;
        match severity {
            Severity::Warning => self.warning_entered_at = Some(now),
            Severity::Critical => self.critical_entered_at = Some(now),
            Severity::Normal => {}
        }
        self.escalation_phase = EscalationPhase::Awareness;
        self.acknowledged = false;
        self.last_fired_at = None;
        self.pending = None;

        info!(
            channel = %self.name,
            from = %previous,
            severity = %severity,
            value = ?self.current_value,
            "channel entered abnormal severity"
        );
    }

    fn clear(&mut self) {
        if self.severity.is_abnormal() {
            info!(channel = %self.name, from = %self.severity, "channel returned to normal");
        }
        self.severity = Severity::Normal;
        self.acknowledged = false;
        self.warning_entered_at = None;
        self.critical_entered_at = None;
        self.escalation_phase = EscalationPhase::None;
        self.pending = None;
    }

    /// Marks the current abnormality as noticed.
    ///
    /// Returns false, changing nothing, if the channel is normal.
    pub fn acknowledge(&mut self) -> bool {
        if !self.severity.is_abnormal() {
            return false;
        }
        self.acknowledged = true;
        self.escalation_phase = EscalationPhase::Awareness;
        info!(channel = %self.name, severity = %self.severity, "channel acknowledged");
        true
    }

    /// Forces the channel back to normal.
    ///
    /// The last observed reading is kept for display.
    pub fn reset(&mut self) {
        self.clear();
        self.last_fired_at = None;
    }

    /// Returns the display view of this channel.
    #[must_use]
    pub const fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            severity: self.severity,
            acknowledged: self.acknowledged,
            escalation_phase: self.escalation_phase,
            current_value: self.current_value,
        }
    }
}
