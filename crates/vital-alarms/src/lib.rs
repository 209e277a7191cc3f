//! Adaptive alarm escalation for patient-monitor vital sign channels.
//!
//! `vital-alarms` decides, for each monitored channel, whether an alarm is
//! warranted, how urgently, and when to repeat it if nobody reacts.
//!
//! # Features
//!
//! - **Classifiers**: Map readings to normal, warning or critical severity
//! - **Escalation Phases**: Awareness, persistence and neglect, with faster
//!   re-fire intervals the longer an abnormality is ignored
//! - **Acknowledgment**: Silences a channel until its severity changes
//! - **Hysteresis**: Optionally require abnormal readings to persist before alarming
//! - **Sinks**: Deliver fire events and clear notices to logging, a buffer, or any closure
//! - **Ticker**: Drive the engine periodically from a tokio task
//!
//! # Example
//!
//! ```rust
//! use vital_alarms::{AlarmEngine, EscalationPhase, Readings, RecordingSink, Severity};
//!
//! let mut engine = AlarmEngine::standard();
//! let sink = RecordingSink::new();
//! engine.set_sink(Box::new(sink.clone()));
//!
//! let readings = Readings::new()
//!     .with("hr", 32.0)
//!     .with("spo2", 97.0);
//!
//! let report = engine.tick(&readings);
//! assert_eq!(report.fired.len(), 1);
//!
//! let states = engine.query_states();
//! assert_eq!(states["hr"].severity, Severity::Critical);
//! assert_eq!(states["hr"].escalation_phase, EscalationPhase::Awareness);
//!
//! // The clinician noticed; no more alarms until the severity changes.
//! engine.acknowledge("hr");
//! assert!(engine.tick(&readings).fired.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod classifiers;
pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod runtime;
pub mod sinks;
pub mod state;
pub mod types;

// Re-export main types at crate root
pub use classifiers::{Bands, BloodPressure, CardiacRhythm, Classifier};
pub use config::EngineConfig;
pub use engine::{AlarmEngine, TickReport};
pub use error::{AlarmError, Result};
pub use policy::{EscalationPolicy, PhaseTimings, PolicyDecision};
pub use runtime::{LiveReadings, ReadingSource, SharedEngine, TickerHandle, spawn_ticker};
pub use sinks::{AlarmSink, CallbackSink, FireEvent, LogSink, RecordingSink};
pub use state::{ChannelState, Transition};
pub use types::{ChannelSnapshot, EscalationPhase, Reading, Readings, Rhythm, Severity};
