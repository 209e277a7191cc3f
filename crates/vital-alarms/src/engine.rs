//! Alarm engine: channel registry, tick evaluation and control API.
//!
//! This module provides the [`AlarmEngine`], the main entry point of the
//! crate. Each tick it classifies the latest readings, updates channel
//! states, evaluates the escalation policy and hands fire events to the
//! registered sink. Acknowledgments and resets act on the same state and are
//! seen by the next tick.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classifiers::{Bands, BloodPressure, Classifier};
use crate::config::EngineConfig;
use crate::error::{AlarmError, Result};
use crate::sinks::{AlarmSink, FireEvent};
use crate::state::{ChannelState, Transition};
use crate::types::{ChannelSnapshot, EscalationPhase, Reading, Readings, Severity};

/// Heart rate channel name.
pub const HEART_RATE: &str = "hr";
/// Oxygen saturation channel name.
pub const SPO2: &str = "spo2";
/// Blood pressure channel name.
pub const BLOOD_PRESSURE: &str = "bp";
/// Respiratory rate channel name.
pub const RESPIRATORY_RATE: &str = "rr";
/// End-tidal CO2 channel name.
pub const ETCO2: &str = "etco2";
/// Cardiac rhythm channel name. Not part of the standard set.
pub const RHYTHM: &str = "rhythm";

/// Input keys read before the channel's own name, in order.
const STANDARD_ALIASES: &[(&str, &str)] = &[(HEART_RATE, "vs_hr"), (SPO2, "vs_spo2")];

/// Maximum allowed length for channel names.
pub const MAX_CHANNEL_NAME_LENGTH: usize = 64;

/// What happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// True if the engine was disabled and did nothing.
    pub skipped: bool,
    /// Number of channels evaluated.
    pub evaluated: usize,
    /// Channels whose severity changed or went pending, in name order.
    pub transitions: Vec<(String, Transition)>,
    /// Fire events produced this tick.
    pub fired: Vec<FireEvent>,
    /// Channels that returned to normal this tick, in name order.
    pub cleared: Vec<String>,
    /// Events accepted by the sink.
    pub delivered: usize,
    /// Fire events and clear notices the sink refused.
    pub delivery_failures: usize,
}

#[derive(Debug)]
struct Channel {
    classifier: Box<dyn Classifier>,
    aliases: Vec<String>,
    state: ChannelState,
}

impl Channel {
    fn reading(&self, name: &str, readings: &Readings) -> Option<Reading> {
        self.aliases
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .find_map(|key| readings.get(key))
    }
}

/// The alarm engine owns every channel's state and the notification sink.
///
/// Channels are kept in name order, so ticks, snapshots and fire events are
/// deterministic.
#[derive(Debug)]
pub struct AlarmEngine {
    config: EngineConfig,
    channels: BTreeMap<String, Channel>,
    sink: Option<Arc<dyn AlarmSink>>,
}

impl Default for AlarmEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmEngine {
    /// Creates an engine with default configuration and no channels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            channels: BTreeMap::new(),
            sink: None,
        }
    }

    /// Creates an engine with custom configuration and no channels.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Creates an engine with default configuration and the five standard
    /// channels: heart rate, SpO2, blood pressure, respiratory rate and EtCO2.
    #[must_use]
    pub fn standard() -> Self {
        let mut engine = Self::new();
        engine.insert_standard_channels();
        engine
    }

    /// Creates an engine with custom configuration and the standard channels.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::InvalidConfig` if the configuration is invalid.
    pub fn standard_with_config(config: EngineConfig) -> Result<Self> {
        let mut engine = Self::with_config(config)?;
        engine.insert_standard_channels();
        Ok(engine)
    }

    fn insert_standard_channels(&mut self) {
        self.insert_channel(HEART_RATE, Box::new(Bands::HEART_RATE));
        self.insert_channel(SPO2, Box::new(Bands::SPO2));
        self.insert_channel(BLOOD_PRESSURE, Box::new(BloodPressure));
        self.insert_channel(RESPIRATORY_RATE, Box::new(Bands::RESPIRATORY_RATE));
        self.insert_channel(ETCO2, Box::new(Bands::ETCO2));

        for &(name, alias) in STANDARD_ALIASES {
            if let Some(channel) = self.channels.get_mut(name) {
                channel.aliases.push(alias.to_string());
            }
        }
    }

    fn insert_channel(&mut self, name: &str, classifier: Box<dyn Classifier>) {
        self.channels.insert(
            name.to_string(),
            Channel {
                classifier,
                aliases: Vec::new(),
                state: ChannelState::new(name),
            },
        );
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ============ Channel Registry ============

    /// Registers a new channel.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::InvalidChannel` if the name is empty or too long,
    /// and `AlarmError::DuplicateChannel` if it is already registered.
    pub fn register_channel(
        &mut self,
        name: impl Into<String>,
        classifier: Box<dyn Classifier>,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(AlarmError::InvalidChannel {
                reason: "channel name cannot be empty".to_string(),
            });
        }
        if name.len() > MAX_CHANNEL_NAME_LENGTH {
            return Err(AlarmError::InvalidChannel {
                reason: format!(
                    "channel name exceeds maximum length of {MAX_CHANNEL_NAME_LENGTH} characters"
                ),
            });
        }
        if self.channels.contains_key(&name) {
            return Err(AlarmError::DuplicateChannel { name });
        }

        info!(channel = %name, classifier = ?classifier, "registered channel");
        self.insert_channel(&name, classifier);
        Ok(())
    }

    /// Adds an input key read in place of the channel's own name.
    ///
    /// Aliases are tried in the order they were added, and the channel name
    /// last. The standard heart rate and SpO2 channels come with `vs_hr` and
    /// `vs_spo2`.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::InvalidChannel` if the channel is unknown or the
    /// alias is empty.
    pub fn register_alias(&mut self, channel: &str, alias: impl Into<String>) -> Result<()> {
        let alias = alias.into();
        if alias.is_empty() {
            return Err(AlarmError::InvalidChannel {
                reason: "alias cannot be empty".to_string(),
            });
        }
        let Some(entry) = self.channels.get_mut(channel) else {
            return Err(AlarmError::InvalidChannel {
                reason: format!("unknown channel: {channel}"),
            });
        };
        if !entry.aliases.contains(&alias) {
            debug!(channel = %channel, alias = %alias, "registered input alias");
            entry.aliases.push(alias);
        }
        Ok(())
    }

    /// Returns the registered channel names in order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the full state of a channel.
    #[must_use]
    pub fn channel_state(&self, name: &str) -> Option<&ChannelState> {
        self.channels.get(name).map(|c| &c.state)
    }

    // ============ Sink and Master Switch ============

    /// Registers the notification sink, returning the one it replaces.
    pub fn set_sink(&mut self, sink: Box<dyn AlarmSink>) -> Option<Arc<dyn AlarmSink>> {
        info!(sink = %sink.name(), "registered alarm sink");
        self.sink.replace(Arc::from(sink))
    }

    /// Removes the notification sink.
    pub fn clear_sink(&mut self) -> Option<Arc<dyn AlarmSink>> {
        self.sink.take()
    }

    /// Returns a handle to the registered sink.
    #[must_use]
    pub fn sink(&self) -> Option<Arc<dyn AlarmSink>> {
        self.sink.clone()
    }

    /// Returns true if a sink is registered.
    #[must_use]
    pub const fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Turns the whole engine on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled != enabled {
            info!(enabled, "alarm engine toggled");
        }
        self.config.enabled = enabled;
    }

    /// Returns true if the engine evaluates ticks.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    // ============ Evaluation ============

    /// Runs one tick at the current wall-clock time.
    pub fn tick(&mut self, readings: &Readings) -> TickReport {
        self.tick_at(readings, Utc::now())
    }

    /// Runs one tick at `now` and delivers its notifications to the sink.
    pub fn tick_at(&mut self, readings: &Readings, now: DateTime<Utc>) -> TickReport {
        let mut report = self.evaluate_at(readings, now);
        deliver(self.sink.as_deref(), &mut report);
        report
    }

    /// Runs one tick at `now` without notifying the sink.
    ///
    /// Channel states and `last_fired_at` are updated exactly as in
    /// [`tick_at`](Self::tick_at); the caller owns delivery of the returned
    /// report. Channels without a usable reading are classified against
    /// their classifier's fallback reading.
    pub fn evaluate_at(&mut self, readings: &Readings, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        if !self.config.enabled {
            debug!("alarm engine disabled, skipping tick");
            report.skipped = true;
            return report;
        }

        let sustain = self.config.sustain();
        let policy = self.config.policy;

        for (name, channel) in &mut self.channels {
            let reading = channel
                .reading(name, readings)
                .unwrap_or_else(|| channel.classifier.fallback());
            let severity = channel.classifier.classify(&reading);

            let transition = channel.state.observe(severity, reading, now, sustain);
            if transition == Transition::Cleared {
                report.cleared.push(name.clone());
            }
            if transition != Transition::Unchanged {
                report.transitions.push((name.clone(), transition));
            }
            report.evaluated += 1;
        }

        for (name, channel) in &mut self.channels {
            let state = &mut channel.state;
            let decision = policy.evaluate(
                state.severity,
                state.acknowledged,
                state.entered_at(),
                state.last_fired_at,
                now,
            );

            state.escalation_phase = if state.acknowledged {
                EscalationPhase::Awareness
            } else {
                decision.phase
            };

            if decision.fire {
                state.last_fired_at = Some(now);
                report.fired.push(FireEvent::new(
                    name.clone(),
                    decision.phase,
                    state.severity,
                    state.current_value,
                    now,
                ));
            }
        }

        debug!(
            channels = report.evaluated,
            transitions = report.transitions.len(),
            fired = report.fired.len(),
            "tick evaluated"
        );

        report
    }

    // ============ Control API ============

    /// Acknowledges a channel's current abnormality.
    ///
    /// Returns true if the channel was abnormal; normal or unknown channels
    /// are left alone.
    pub fn acknowledge(&mut self, name: &str) -> bool {
        match self.channels.get_mut(name) {
            Some(channel) => channel.state.acknowledge(),
            None => {
                debug!(channel = %name, "acknowledge for unknown channel ignored");
                false
            }
        }
    }

    /// Acknowledges every abnormal channel, returning how many were.
    pub fn acknowledge_all(&mut self) -> usize {
        let count = self
            .channels
            .values_mut()
            .map(|c| c.state.acknowledge())
            .filter(|&acked| acked)
            .count();
        if count > 0 {
            info!(count, "acknowledged all abnormal channels");
        }
        count
    }

    /// Forces a channel back to normal.
    ///
    /// Returns false for unknown channels.
    pub fn reset(&mut self, name: &str) -> bool {
        match self.channels.get_mut(name) {
            Some(channel) => {
                channel.state.reset();
                true
            }
            None => false,
        }
    }

    /// Forces every channel back to normal.
    pub fn reset_all(&mut self) {
        for channel in self.channels.values_mut() {
            channel.state.reset();
        }
        info!("reset all channels");
    }

    /// Returns the highest severity across all channels, for a master indicator.
    ///
    /// Acknowledged channels still count. An engine with no channels is normal.
    #[must_use]
    pub fn highest_severity(&self) -> Severity {
        self.channels
            .values()
            .map(|c| c.state.severity)
            .max()
            .unwrap_or_default()
    }

    /// Returns a display snapshot of every channel, keyed by name.
    #[must_use]
    pub fn query_states(&self) -> BTreeMap<String, ChannelSnapshot> {
        self.channels
            .iter()
            .map(|(name, c)| (name.clone(), c.state.snapshot()))
            .collect()
    }
}

/// Hands a report's clear notices and fire events to `sink`.
///
/// Clear notices go first so a sound layer can stop a tone before the next
/// one starts. Failures are logged and counted, never propagated.
pub(crate) fn deliver(sink: Option<&dyn AlarmSink>, report: &mut TickReport) {
    if report.fired.is_empty() && report.cleared.is_empty() {
        return;
    }
    let Some(sink) = sink else {
        debug!(events = report.fired.len(), "no alarm sink registered");
        return;
    };
    if !sink.is_enabled() {
        debug!(sink = %sink.name(), "alarm sink disabled, skipping delivery");
        return;
    }

    for channel in &report.cleared {
        if let Err(e) = sink.cleared(channel) {
            warn!(sink = %sink.name(), channel = %channel, error = %e, "clear notice failed");
            report.delivery_failures += 1;
        }
    }

    for event in &report.fired {
        match sink.notify(event) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(
                    sink = %sink.name(),
                    channel = %event.channel,
                    error = %e,
                    "fire event delivery failed"
                );
                report.delivery_failures += 1;
            }
        }
    }

    debug!(
        sink = %sink.name(),
        delivered = report.delivered,
        failures = report.delivery_failures,
        "tick delivered"
    );
}
