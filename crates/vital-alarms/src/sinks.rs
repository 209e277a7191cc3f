//! Fire event sinks.
//!
//! The engine hands every fire event to a single [`AlarmSink`]. What the sink
//! does with it (play a tone, flash a badge, log a line) is its own business.
//! When a channel returns to normal the sink also gets a clear notice, so
//! anything still sounding for that channel can fade out.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{EscalationPhase, Reading, Severity};

/// A signal that a channel should alert now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireEvent {
    /// Unique identifier for this fire.
    pub id: Uuid,
    /// Name of the channel that fired.
    pub channel: String,
    /// Escalation phase at the time of firing.
    pub phase: EscalationPhase,
    /// Channel severity at the time of firing.
    pub severity: Severity,
    /// Reading that was current when the channel fired.
    pub value: Option<Reading>,
    /// When the event fired.
    pub fired_at: DateTime<Utc>,
}

impl FireEvent {
    /// Creates a fire event with a fresh id.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        phase: EscalationPhase,
        severity: Severity,
        value: Option<Reading>,
        fired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            phase,
            severity,
            value,
            fired_at,
        }
    }
}

/// Receives fire events from the engine.
///
/// Delivery is synchronous, inside the tick that fired; implementations
/// should hand the event off rather than block.
pub trait AlarmSink: Send + Sync + fmt::Debug {
    /// Returns the name of this sink.
    fn name(&self) -> &str;

    /// Delivers one fire event.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::SinkFailed` if the event cannot be delivered.
    fn notify(&self, event: &FireEvent) -> Result<()>;

    /// Called when a channel returns to normal during a tick.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::SinkFailed` if the notice cannot be delivered.
    fn cleared(&self, _channel: &str) -> Result<()> {
        Ok(())
    }

    /// Returns true if this sink is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// A sink that logs fire events through `tracing`.
#[derive(Debug, Clone)]
pub struct LogSink {
    name: String,
    enabled: bool,
}

impl LogSink {
    /// Creates a new log sink.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Sets whether the sink is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("log")
    }
}

impl AlarmSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, event: &FireEvent) -> Result<()> {
        match event.severity {
            Severity::Critical => error!(
                channel = %event.channel,
                phase = %event.phase,
                severity = %event.severity,
                value = ?event.value,
                "ALARM"
            ),
            Severity::Warning => warn!(
                channel = %event.channel,
                phase = %event.phase,
                severity = %event.severity,
                value = ?event.value,
                "ALARM"
            ),
            Severity::Normal => debug!(channel = %event.channel, "fire event for normal channel"),
        }
        Ok(())
    }

    fn cleared(&self, channel: &str) -> Result<()> {
        info!(channel = %channel, "alarm cleared");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A sink that keeps every event it receives.
///
/// Clones share the same buffer, so a clone can be registered with the
/// engine while another clone is read by the UI or a test.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<FireEvent>>>,
    cleared: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<FireEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns all recorded events.
    pub fn drain(&self) -> Vec<FireEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if no fire event has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Returns the channels cleared so far, oldest first.
    #[must_use]
    pub fn cleared_channels(&self) -> Vec<String> {
        self.cleared.lock().clone()
    }
}

impl AlarmSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify(&self, event: &FireEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn cleared(&self, channel: &str) -> Result<()> {
        self.cleared.lock().push(channel.to_string());
        Ok(())
    }
}

type Callback = dyn Fn(&FireEvent) -> Result<()> + Send + Sync;
type ClearCallback = dyn Fn(&str) -> Result<()> + Send + Sync;

/// A sink that forwards events to a closure.
pub struct CallbackSink {
    name: String,
    callback: Box<Callback>,
    on_clear: Option<Box<ClearCallback>>,
}

impl CallbackSink {
    /// Creates a sink calling `callback` for every event.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&FireEvent) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
            on_clear: None,
        }
    }

    /// Also calls `on_clear` with the channel name when a channel clears.
    #[must_use]
    pub fn on_clear<F>(mut self, on_clear: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.on_clear = Some(Box::new(on_clear));
        self
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink")
            .field("name", &self.name)
            .field("on_clear", &self.on_clear.is_some())
            .finish_non_exhaustive()
    }
}

impl AlarmSink for CallbackSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, event: &FireEvent) -> Result<()> {
        (self.callback)(event)
    }

    fn cleared(&self, channel: &str) -> Result<()> {
        self.on_clear.as_ref().map_or(Ok(()), |f| f(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlarmError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_event() -> FireEvent {
        FireEvent::new(
            "hr",
            EscalationPhase::Awareness,
            Severity::Critical,
            Some(Reading::Scalar(30.0)),
            Utc::now(),
        )
    }

    mod event_tests {
        use super::*;

        #[test]
        fn events_get_distinct_ids() {
            assert_ne!(test_event().id, test_event().id);
        }

        #[test]
        fn event_serializes_lowercase_enums() {
            let json = serde_json::to_value(test_event()).unwrap();
            assert_eq!(json["channel"], "hr");
            assert_eq!(json["phase"], "awareness");
            assert_eq!(json["severity"], "critical");
            assert_eq!(json["value"], 30.0);
        }
    }

    mod log_sink_tests {
        use super::*;

        #[test]
        fn log_sink_default() {
            let sink = LogSink::default();
            assert_eq!(sink.name(), "log");
            assert!(sink.is_enabled());
        }

        #[test]
        fn log_sink_disabled() {
            let sink = LogSink::new("quiet").enabled(false);
            assert!(!sink.is_enabled());
        }

        #[test]
        fn log_sink_accepts_every_severity() {
            let sink = LogSink::default();
            for severity in [Severity::Normal, Severity::Warning, Severity::Critical] {
                let event = FireEvent {
                    severity,
                    ..test_event()
                };
                assert!(sink.notify(&event).is_ok());
            }
        }
    }

    mod recording_sink_tests {
        use super::*;

        #[test]
        fn clones_share_buffer() {
            let sink = RecordingSink::new();
            let registered = sink.clone();

            registered.notify(&test_event()).unwrap();
            registered.notify(&test_event()).unwrap();

            assert_eq!(sink.len(), 2);
            assert_eq!(sink.events()[0].channel, "hr");
        }

        #[test]
        fn drain_empties() {
            let sink = RecordingSink::new();
            sink.notify(&test_event()).unwrap();

            assert_eq!(sink.drain().len(), 1);
            assert!(sink.is_empty());
        }

        #[test]
        fn records_clear_notices_separately() {
            let sink = RecordingSink::new();
            sink.cleared("spo2").unwrap();
            sink.cleared("hr").unwrap();

            assert!(sink.is_empty());
            assert_eq!(sink.cleared_channels(), vec!["spo2", "hr"]);
        }
    }

    mod callback_sink_tests {
        use super::*;

        #[test]
        fn forwards_to_closure() {
            let count = Arc::new(AtomicUsize::new(0));
            let seen = Arc::clone(&count);
            let sink = CallbackSink::new("counter", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

            sink.notify(&test_event()).unwrap();

            assert_eq!(count.load(Ordering::SeqCst), 1);
            assert_eq!(sink.name(), "counter");
        }

        #[test]
        fn propagates_closure_error() {
            let sink = CallbackSink::new("broken", |_| {
                Err(AlarmError::SinkFailed {
                    reason: "speaker unplugged".to_string(),
                })
            });

            assert!(matches!(
                sink.notify(&test_event()),
                Err(AlarmError::SinkFailed { .. })
            ));
        }

        #[test]
        fn clear_without_handler_is_ok() {
            let sink = CallbackSink::new("fires-only", |_| Ok(()));
            assert!(sink.cleared("hr").is_ok());
        }

        #[test]
        fn clear_handler_gets_channel() {
            let cleared = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&cleared);
            let sink = CallbackSink::new("tones", |_| Ok(())).on_clear(move |channel| {
                seen.lock().push(channel.to_string());
                Ok(())
            });

            sink.cleared("bp").unwrap();

            assert_eq!(*cleared.lock(), vec!["bp".to_string()]);
        }

        #[test]
        fn debug_shows_name() {
            let sink = CallbackSink::new("ui", |_| Ok(()));
            assert!(format!("{sink:?}").contains("ui"));
        }
    }
}
