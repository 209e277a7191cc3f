//! Shared engine handle and periodic ticker.
//!
//! [`SharedEngine`] puts an [`AlarmEngine`] behind one mutex so the ticker
//! task and UI callers are serialised: an acknowledgment lands wholly before
//! or after a tick's state update, never in the middle of one. The sink is
//! called after the lock is released, so a sink may call back into the same
//! handle.
//!
//! ```rust,no_run
//! use vital_alarms::{AlarmEngine, LiveReadings, LogSink, SharedEngine};
//!
//! # async fn run() -> vital_alarms::Result<()> {
//! let mut engine = AlarmEngine::standard();
//! engine.set_sink(Box::new(LogSink::default()));
//!
//! let engine = SharedEngine::new(engine);
//! let readings = LiveReadings::new();
//! let ticker = engine.spawn_ticker(readings.clone())?;
//!
//! readings.set("hr", 32.0);
//! // ... later, from the UI
//! engine.acknowledge("hr");
//!
//! ticker.stop().await;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::{self, AlarmEngine, TickReport};
use crate::error::{AlarmError, Result};
use crate::types::{ChannelSnapshot, Reading, Readings, Severity};

/// Supplies the readings snapshot for each tick.
pub trait ReadingSource: Send + Sync + 'static {
    /// Returns the latest readings.
    fn snapshot(&self) -> Readings;
}

impl ReadingSource for Readings {
    fn snapshot(&self) -> Readings {
        self.clone()
    }
}

/// Readings updated in place by a simulation and read by the ticker.
#[derive(Debug, Clone, Default)]
pub struct LiveReadings {
    inner: Arc<RwLock<Readings>>,
}

impl LiveReadings {
    /// Creates an empty live snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one channel's reading.
    pub fn set(&self, channel: impl Into<String>, reading: impl Into<Reading>) {
        self.inner.write().set(channel, reading);
    }

    /// Replaces the whole snapshot.
    pub fn replace(&self, readings: Readings) {
        *self.inner.write() = readings;
    }
}

impl ReadingSource for LiveReadings {
    fn snapshot(&self) -> Readings {
        self.inner.read().clone()
    }
}

/// A cloneable, thread-safe handle to one alarm engine.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<AlarmEngine>>,
}

impl From<AlarmEngine> for SharedEngine {
    fn from(engine: AlarmEngine) -> Self {
        Self::new(engine)
    }
}

impl SharedEngine {
    /// Wraps an engine.
    #[must_use]
    pub fn new(engine: AlarmEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Runs `f` with exclusive access to the engine.
    ///
    /// `f` runs under the lock and must not call back into this handle.
    pub fn with<R>(&self, f: impl FnOnce(&mut AlarmEngine) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// Runs one tick at the current time.
    pub fn tick(&self, readings: &Readings) -> TickReport {
        self.tick_at(readings, Utc::now())
    }

    /// Runs one tick at `now`.
    ///
    /// State is updated under the lock; the sink is notified after it is
    /// released, before this call returns.
    pub fn tick_at(&self, readings: &Readings, now: DateTime<Utc>) -> TickReport {
        let (mut report, sink) = {
            let mut engine = self.inner.lock();
            let report = engine.evaluate_at(readings, now);
            (report, engine.sink())
        };
        engine::deliver(sink.as_deref(), &mut report);
        report
    }

    /// See [`AlarmEngine::acknowledge`].
    pub fn acknowledge(&self, name: &str) -> bool {
        self.inner.lock().acknowledge(name)
    }

    /// See [`AlarmEngine::acknowledge_all`].
    pub fn acknowledge_all(&self) -> usize {
        self.inner.lock().acknowledge_all()
    }

    /// See [`AlarmEngine::reset`].
    pub fn reset(&self, name: &str) -> bool {
        self.inner.lock().reset(name)
    }

    /// See [`AlarmEngine::reset_all`].
    pub fn reset_all(&self) {
        self.inner.lock().reset_all();
    }

    /// See [`AlarmEngine::query_states`].
    #[must_use]
    pub fn query_states(&self) -> BTreeMap<String, ChannelSnapshot> {
        self.inner.lock().query_states()
    }

    /// See [`AlarmEngine::highest_severity`].
    #[must_use]
    pub fn highest_severity(&self) -> Severity {
        self.inner.lock().highest_severity()
    }

    /// See [`AlarmEngine::set_enabled`].
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().set_enabled(enabled);
    }

    /// Spawns a ticker at the configured tick interval.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::InvalidConfig` if the tick interval is zero.
    pub fn spawn_ticker(&self, source: impl ReadingSource) -> Result<TickerHandle> {
        let period = self.inner.lock().config().tick_interval();
        spawn_ticker(self.clone(), source, period)
    }
}

/// Handle to a running ticker task.
///
/// Dropping the handle also stops the ticker: the stop sender is dropped
/// with it, which completes the task's stop branch with `RecvError`.
#[derive(Debug)]
pub struct TickerHandle {
    stop_tx: oneshot::Sender<()>,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Returns the number of ticks completed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Stops the ticker and waits for it to finish, returning the tick count.
    pub async fn stop(self) -> u64 {
        // Send fails only if the task already ended.
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "alarm ticker task failed");
        }
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Spawns a task ticking `engine` every `period` with readings from `source`.
///
/// Missed ticks are skipped rather than replayed in a burst. Must be called
/// from within a tokio runtime.
///
/// # Errors
///
/// Returns `AlarmError::InvalidConfig` if `period` is zero.
pub fn spawn_ticker(
    engine: SharedEngine,
    source: impl ReadingSource,
    period: Duration,
) -> Result<TickerHandle> {
    if period.is_zero() {
        return Err(AlarmError::InvalidConfig {
            reason: "ticker period must be greater than 0".to_string(),
        });
    }

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ticks);

    info!(period_ms = period.as_millis() as u64, "starting alarm ticker");

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Ok on stop(), Err once the handle is dropped.
                _ = &mut stop_rx => break,
                _ = interval.tick() => {
                    let readings = source.snapshot();
                    let report = engine.tick(&readings);
                    counter.fetch_add(1, Ordering::Relaxed);
                    if !report.fired.is_empty() {
                        debug!(fired = report.fired.len(), "ticker fired alarms");
                    }
                }
            }
        }

        info!(ticks = counter.load(Ordering::Relaxed), "alarm ticker stopped");
    });

    Ok(TickerHandle {
        stop_tx,
        ticks,
        task,
    })
}
