//! Severity classifiers for vital sign channels.
//!
//! A classifier maps one reading to a [`Severity`]. Classifiers are pure and
//! hold no history; the engine keeps all per-channel state.
//!
//! Most vitals are described by four strict bounds, see [`Bands`]. Blood
//! pressure combines systolic, diastolic and mean arterial pressure and has
//! its own classifier, [`BloodPressure`]. Cardiac rhythm is categorical, see
//! [`CardiacRhythm`].
//!
//! A reading of the wrong kind for a classifier (a rhythm label on a numeric
//! channel, say) is classified as the classifier's fallback.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Reading, Rhythm, Severity};

/// Classifies readings for one channel.
///
/// Implement this trait to register custom channels with the engine.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Returns the severity of the reading.
    fn classify(&self, reading: &Reading) -> Severity;

    /// Reading assumed when the snapshot has no usable value for the channel.
    fn fallback(&self) -> Reading;
}

/// Strict threshold bands for a single-valued vital.
///
/// A value is critical if it lies strictly below `critical_below` or strictly
/// above `critical_above`, otherwise warning under the same test against the
/// warning bounds, otherwise normal. Unset bounds never match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    /// Critical when the value is below this.
    pub critical_below: Option<f64>,
    /// Warning when the value is below this.
    pub warning_below: Option<f64>,
    /// Warning when the value is above this.
    pub warning_above: Option<f64>,
    /// Critical when the value is above this.
    pub critical_above: Option<f64>,
    /// Value assumed when no reading is available.
    pub fallback: f64,
}

impl Bands {
    /// Heart rate: normal 50-120, warning outside it, critical below 40 or above 160.
    ///
    /// 120-140 is mild tachycardia and 140-160 moderate; both classify as
    /// warning. Asystole (0) falls under the critical floor, and a missing
    /// heart rate is treated as asystole.
    pub const HEART_RATE: Self = Self {
        critical_below: Some(40.0),
        warning_below: Some(50.0),
        warning_above: Some(120.0),
        critical_above: Some(160.0),
        fallback: 0.0,
    };

    /// Oxygen saturation: critical below 85, warning below 95.
    pub const SPO2: Self = Self {
        critical_below: Some(85.0),
        warning_below: Some(95.0),
        warning_above: None,
        critical_above: None,
        fallback: 100.0,
    };

    /// Respiratory rate: critical outside 6-35, warning outside 8-30.
    pub const RESPIRATORY_RATE: Self = Self {
        critical_below: Some(6.0),
        warning_below: Some(8.0),
        warning_above: Some(30.0),
        critical_above: Some(35.0),
        fallback: 16.0,
    };

    /// End-tidal CO2: critical outside 20-70, warning outside 25-60.
    pub const ETCO2: Self = Self {
        critical_below: Some(20.0),
        warning_below: Some(25.0),
        warning_above: Some(60.0),
        critical_above: Some(70.0),
        fallback: 40.0,
    };

    /// Classifies a single value against the bands.
    #[must_use]
    pub fn severity_of(&self, value: f64) -> Severity {
        let below = |bound: Option<f64>| bound.is_some_and(|b| value < b);
        let above = |bound: Option<f64>| bound.is_some_and(|b| value > b);

        if below(self.critical_below) || above(self.critical_above) {
            Severity::Critical
        } else if below(self.warning_below) || above(self.warning_above) {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

impl Classifier for Bands {
    fn classify(&self, reading: &Reading) -> Severity {
        self.severity_of(reading.primary().unwrap_or(self.fallback))
    }

    fn fallback(&self) -> Reading {
        Reading::Scalar(self.fallback)
    }
}

/// Blood pressure classifier over systolic, diastolic and mean arterial pressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BloodPressure;

impl BloodPressure {
    /// Mean arterial pressure, `(sys + 2 * dia) / 3`.
    ///
    /// A non-positive systolic value yields 0.
    #[must_use]
    pub fn mean_arterial(sys: f64, dia: f64) -> f64 {
        if sys > 0.0 {
            (sys + 2.0 * dia) / 3.0
        } else {
            0.0
        }
    }

    /// Classifies a systolic/diastolic pair.
    #[must_use]
    pub fn severity_of(sys: f64, dia: f64) -> Severity {
        let map = Self::mean_arterial(sys, dia);

        let hypotension_critical = sys < 70.0 || map < 50.0;
        let hypertension_critical = sys > 180.0 || dia > 110.0;
        if hypotension_critical || hypertension_critical {
            return Severity::Critical;
        }

        let hypotension_warning = sys < 90.0 || map < 60.0;
        let hypertension_warning = sys > 160.0 || dia > 100.0;
        if hypotension_warning || hypertension_warning {
            return Severity::Warning;
        }

        Severity::Normal
    }
}

impl Classifier for BloodPressure {
    fn classify(&self, reading: &Reading) -> Severity {
        match *reading {
            Reading::Pressure { sys, dia } => Self::severity_of(sys, dia),
            Reading::Scalar(sys) => Self::severity_of(sys, 0.0),
            Reading::Rhythm(_) => Severity::Normal,
        }
    }

    fn fallback(&self) -> Reading {
        Reading::pressure(120.0, 80.0)
    }
}

/// Cardiac rhythm classifier.
///
/// VFib, VTach, asystole and PEA are critical; AFib, atrial flutter and SVT
/// are warnings. Everything else, numeric readings included, is normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardiacRhythm;

impl CardiacRhythm {
    /// Classifies a rhythm label.
    #[must_use]
    pub const fn severity_of(rhythm: Rhythm) -> Severity {
        match rhythm {
            Rhythm::Vfib | Rhythm::Vtach | Rhythm::Asystole | Rhythm::Pea => Severity::Critical,
            Rhythm::Afib | Rhythm::Aflutter | Rhythm::Svt => Severity::Warning,
            Rhythm::Sinus | Rhythm::Other => Severity::Normal,
        }
    }
}

impl Classifier for CardiacRhythm {
    fn classify(&self, reading: &Reading) -> Severity {
        match *reading {
            Reading::Rhythm(rhythm) => Self::severity_of(rhythm),
            Reading::Scalar(_) | Reading::Pressure { .. } => Severity::Normal,
        }
    }

    fn fallback(&self) -> Reading {
        Reading::Rhythm(Rhythm::Sinus)
    }
}

/// Classifies a heart rate in beats per minute.
#[must_use]
pub fn heart_rate(bpm: f64) -> Severity {
    Bands::HEART_RATE.severity_of(bpm)
}

/// Classifies an oxygen saturation percentage.
#[must_use]
pub fn spo2(percent: f64) -> Severity {
    Bands::SPO2.severity_of(percent)
}

/// Classifies a blood pressure pair in mmHg.
#[must_use]
pub fn blood_pressure(sys: f64, dia: f64) -> Severity {
    BloodPressure::severity_of(sys, dia)
}

/// Classifies a respiratory rate in breaths per minute.
#[must_use]
pub fn respiratory_rate(rate: f64) -> Severity {
    Bands::RESPIRATORY_RATE.severity_of(rate)
}

/// Classifies an end-tidal CO2 value in mmHg.
#[must_use]
pub fn etco2(mmhg: f64) -> Severity {
    Bands::ETCO2.severity_of(mmhg)
}

/// Classifies a cardiac rhythm label.
#[must_use]
pub const fn rhythm(rhythm: Rhythm) -> Severity {
    CardiacRhythm::severity_of(rhythm)
}
