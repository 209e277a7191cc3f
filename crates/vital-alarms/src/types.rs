//! Core types for the alarm engine.
//!
//! This module provides the fundamental types used throughout the vital-alarms crate:
//! - [`Severity`]: The classification of a channel's current reading
//! - [`EscalationPhase`]: How urgently an unacknowledged channel should signal
//! - [`Rhythm`]: A cardiac rhythm label
//! - [`Reading`]: A single raw measurement (scalar, blood-pressure pair or rhythm)
//! - [`Readings`]: A snapshot of readings keyed by channel name
//! - [`ChannelSnapshot`]: The read-only view of a channel handed to the UI

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The severity of a channel's current reading.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reading within the normal range.
    #[default]
    Normal,
    /// Reading abnormal, should be looked at.
    Warning,
    /// Reading dangerous, requires immediate attention.
    Critical,
}

impl Severity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Returns true for warning and critical.
    #[must_use]
    pub const fn is_abnormal(&self) -> bool {
        matches!(self, Self::Warning | Self::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Escalation phase of a channel, 0 through 3.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EscalationPhase {
    /// Not escalating: normal or acknowledged.
    #[default]
    None,
    /// Single notification on entering an abnormal severity.
    Awareness,
    /// Recurring reminder while the abnormality is ignored.
    Persistence,
    /// Frequent alerts after prolonged neglect.
    Neglect,
}

impl EscalationPhase {
    /// Returns the phase number (0-3).
    #[must_use]
    pub const fn level(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Awareness => 1,
            Self::Persistence => 2,
            Self::Neglect => 3,
        }
    }

    /// Returns the phase as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Awareness => "awareness",
            Self::Persistence => "persistence",
            Self::Neglect => "neglect",
        }
    }
}

impl std::fmt::Display for EscalationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cardiac rhythm label as reported by the monitor.
///
/// Labels are matched case-insensitively; anything unrecognised becomes
/// [`Rhythm::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Rhythm {
    /// Normal sinus rhythm.
    #[default]
    Sinus,
    /// Atrial fibrillation.
    Afib,
    /// Atrial flutter.
    Aflutter,
    /// Supraventricular tachycardia.
    Svt,
    /// Ventricular tachycardia.
    Vtach,
    /// Ventricular fibrillation.
    Vfib,
    /// No electrical activity.
    Asystole,
    /// Pulseless electrical activity.
    Pea,
    /// Any other label.
    Other,
}

impl Rhythm {
    /// Parses a label, falling back to [`Rhythm::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "sinus" | "nsr" => Self::Sinus,
            "afib" => Self::Afib,
            "aflutter" => Self::Aflutter,
            "svt" => Self::Svt,
            "vtach" => Self::Vtach,
            "vfib" => Self::Vfib,
            "asystole" => Self::Asystole,
            "pea" => Self::Pea,
            _ => Self::Other,
        }
    }

    /// Returns the label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sinus => "sinus",
            Self::Afib => "afib",
            Self::Aflutter => "aflutter",
            Self::Svt => "svt",
            Self::Vtach => "vtach",
            Self::Vfib => "vfib",
            Self::Asystole => "asystole",
            Self::Pea => "pea",
            Self::Other => "other",
        }
    }
}

impl From<String> for Rhythm {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<Rhythm> for &'static str {
    fn from(rhythm: Rhythm) -> Self {
        rhythm.as_str()
    }
}

impl std::fmt::Display for Rhythm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw measurement for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    /// Systolic/diastolic blood pressure pair (mmHg).
    Pressure {
        /// Systolic pressure.
        sys: f64,
        /// Diastolic pressure.
        dia: f64,
    },
    /// Any single-valued measurement.
    Scalar(f64),
    /// A categorical rhythm label.
    Rhythm(Rhythm),
}

impl Reading {
    /// Creates a blood-pressure reading.
    #[must_use]
    pub const fn pressure(sys: f64, dia: f64) -> Self {
        Self::Pressure { sys, dia }
    }

    /// Returns the headline value: the scalar itself, or systolic pressure.
    ///
    /// Rhythm labels have no numeric value.
    #[must_use]
    pub const fn primary(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Pressure { sys, .. } => Some(*sys),
            Self::Rhythm(_) => None,
        }
    }

    /// Returns true if every numeric component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Pressure { sys, dia } => sys.is_finite() && dia.is_finite(),
            Self::Rhythm(_) => true,
        }
    }
}

impl From<Rhythm> for Reading {
    fn from(rhythm: Rhythm) -> Self {
        Self::Rhythm(rhythm)
    }
}

impl From<f64> for Reading {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Pressure { sys, dia } => write!(f, "{sys}/{dia}"),
            Self::Rhythm(r) => write!(f, "{r}"),
        }
    }
}

/// A snapshot of the latest readings, keyed by channel name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Readings {
    values: HashMap<String, Reading>,
}

impl Readings {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reading, builder style.
    #[must_use]
    pub fn with(mut self, channel: impl Into<String>, reading: impl Into<Reading>) -> Self {
        self.set(channel, reading);
        self
    }

    /// Sets or replaces the reading for a channel.
    pub fn set(&mut self, channel: impl Into<String>, reading: impl Into<Reading>) {
        self.values.insert(channel.into(), reading.into());
    }

    /// Removes the reading for a channel.
    pub fn remove(&mut self, channel: &str) -> Option<Reading> {
        self.values.remove(channel)
    }

    /// Returns the usable reading for a channel.
    ///
    /// Non-finite readings count as missing.
    #[must_use]
    pub fn get(&self, channel: &str) -> Option<Reading> {
        self.values.get(channel).copied().filter(Reading::is_finite)
    }

    /// Returns the number of readings in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the snapshot holds no readings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parses a snapshot from JSON such as `{"hr": 75, "bp": {"sys": 120, "dia": 80}}`.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::SerializationError` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<K: Into<String>, R: Into<Reading>> FromIterator<(K, R)> for Readings {
    fn from_iter<I: IntoIterator<Item = (K, R)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, r)| (k.into(), r.into()))
                .collect(),
        }
    }
}

/// Read-only view of one channel for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// Current severity.
    pub severity: Severity,
    /// Whether the current abnormality has been acknowledged.
    pub acknowledged: bool,
    /// Current escalation phase.
    pub escalation_phase: EscalationPhase,
    /// Last observed reading, if any tick has run.
    pub current_value: Option<Reading>,
}
