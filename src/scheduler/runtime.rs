//! Scheduler runtime
//!
//! The `ReadingScheduler` state machine: Idle until started, then a
//! self-looping Scheduled -> Fired -> Scheduled chain until stopped. All
//! clearing and arming of the poll timer goes through one code path
//! (`rearm`), so the invariant "at most one pending timer per instance"
//! holds by construction rather than by convention.

use super::{estimate_interval, predict_next_arrival, SchedulerConfig};
use crate::model::Sample;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Callback invoked when a poll is due
///
/// The handler performs the actual fetch and hands fresh history back via
/// [`ReadingScheduler::on_new_data`]. Failures are logged and swallowed:
/// a missed poll must never break the timer chain.
#[async_trait]
pub trait DueHandler: Send + Sync {
    async fn on_due(&self) -> anyhow::Result<()>;
}

/// How the next tick was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Aligned to the predicted arrival of the next reading
    Predictive,
    /// Prediction not trustworthy; polling on the fixed fallback interval
    FixedInterval,
}

/// Read-only snapshot of the scheduler for presentation layers
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub active: bool,
    pub mode: ScheduleMode,
    pub next_expected_arrival: Option<DateTime<Utc>>,
    pub estimated_interval_ms: i64,
    pub confidence: f64,
}

/// One tick of the observational countdown, published every second
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountdownSnapshot {
    pub time_until_next_ms: i64,
    pub next_expected_arrival: Option<DateTime<Utc>>,
}

impl Default for CountdownSnapshot {
    fn default() -> Self {
        Self {
            time_until_next_ms: 0,
            next_expected_arrival: None,
        }
    }
}

/// Mutable scheduler state, exclusively owned by the scheduler instance
struct ScheduleState {
    history: Vec<Sample>,
    active: bool,
    mode: ScheduleMode,
    next_expected: Option<DateTime<Utc>>,
    estimated_interval: Duration,
    confidence: f64,
    /// The single pending poll timer; re-arming always aborts this first
    timer: Option<JoinHandle<()>>,
    /// The independent 1s countdown publisher
    countdown: Option<JoinHandle<()>>,
}

/// Adaptive reading scheduler
///
/// Owns its timers exclusively; callers interact through `start`, `stop`,
/// `on_new_data`, and the read-only `status` / `countdown` views.
pub struct ReadingScheduler {
    config: SchedulerConfig,
    handler: Arc<dyn DueHandler>,
    state: Mutex<ScheduleState>,
    countdown_tx: watch::Sender<CountdownSnapshot>,
}

impl ReadingScheduler {
    /// Create an idle scheduler
    pub fn new(config: SchedulerConfig, handler: Arc<dyn DueHandler>) -> Arc<Self> {
        let (countdown_tx, _) = watch::channel(CountdownSnapshot::default());
        let estimated_interval = config.default_interval();

        Arc::new(Self {
            config,
            handler,
            state: Mutex::new(ScheduleState {
                history: Vec::new(),
                active: false,
                mode: ScheduleMode::FixedInterval,
                next_expected: None,
                estimated_interval,
                confidence: 0.0,
                timer: None,
                countdown: None,
            }),
            countdown_tx,
        })
    }

    /// Start scheduling against the given history
    ///
    /// Safe to call on a running scheduler; the old timers are cleared and
    /// the schedule recomputed from the new history.
    pub async fn start(self: &Arc<Self>, history: Vec<Sample>) {
        {
            let mut state = self.state.lock().await;
            state.history = history;
            state.active = true;

            if let Some(handle) = state.countdown.take() {
                handle.abort();
            }
            state.countdown = Some(self.spawn_countdown());
        }

        self.rearm().await;

        tracing::info!("reading scheduler started");
    }

    /// Stop scheduling and clear all pending timers
    ///
    /// Idempotent; no callback fires after this returns.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.active = false;
        state.next_expected = None;
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        if let Some(handle) = state.countdown.take() {
            handle.abort();
        }
        let _ = self.countdown_tx.send(CountdownSnapshot::default());

        tracing::info!("reading scheduler stopped");
    }

    /// Replace the analysis history with a fresh batch
    ///
    /// If active, the schedule is recomputed immediately instead of waiting
    /// for the pending timer: new data usually means the old prediction is
    /// stale.
    pub async fn on_new_data(self: &Arc<Self>, history: Vec<Sample>) {
        let active = {
            let mut state = self.state.lock().await;
            state.history = history;
            state.active
        };

        if active {
            self.rearm().await;
        }
    }

    /// Current scheduler snapshot
    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().await;
        SchedulerStatus {
            active: state.active,
            mode: state.mode,
            next_expected_arrival: state.next_expected,
            estimated_interval_ms: state.estimated_interval.num_milliseconds(),
            confidence: state.confidence,
        }
    }

    /// Subscribe to the 1-second countdown feed
    pub fn countdown(&self) -> watch::Receiver<CountdownSnapshot> {
        self.countdown_tx.subscribe()
    }

    /// Recompute the prediction and arm the poll timer (clear-then-arm)
    ///
    /// This is the only place a timer is created or destroyed outside
    /// `stop`, keeping the one-pending-timer invariant in a single
    /// auditable path.
    async fn rearm(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if !state.active {
            return;
        }

        let now = Utc::now();
        let prediction = predict_next_arrival(&state.history, now, &self.config);
        let buffer = Duration::seconds(self.config.fixed_buffer_secs as i64);

        let (mode, target) = match prediction.time {
            Some(time) if prediction.confidence >= self.config.low_confidence_threshold => {
                (ScheduleMode::Predictive, time)
            }
            // Prediction missing or untrustworthy: fixed-interval fallback.
            _ => (
                ScheduleMode::FixedInterval,
                now + Duration::seconds(self.config.fallback_interval_secs as i64),
            ),
        };

        let delay = (target - now).max(Duration::zero()) + buffer;

        state.mode = mode;
        state.next_expected = Some(target);
        state.estimated_interval = estimate_interval(&state.history, &self.config);
        state.confidence = prediction.confidence;

        // Clear-then-arm: the previous timer is gone before the new one
        // exists, so two can never coexist.
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }

        let scheduler = Arc::clone(self);
        let sleep_for = delay.to_std().unwrap_or_default();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(sleep_for).await;
            scheduler.fire().await;
        }));

        tracing::debug!(
            mode = ?mode,
            delay_ms = delay.num_milliseconds(),
            confidence = prediction.confidence,
            "armed poll timer"
        );
    }

    /// One tick of the Scheduled -> Fired -> Scheduled loop
    ///
    /// Returns a boxed future so the fire -> rearm -> fire recursion has a
    /// nameable `Send` bound.
    fn fire(
        self: Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
            {
                let state = self.state.lock().await;
                if !state.active {
                    return;
                }
            }

            tracing::debug!("poll due, invoking handler");

            // Fire-and-forget: the handler's failure is its own problem; the
            // chain re-arms unconditionally so polling keeps going.
            if let Err(e) = self.handler.on_due().await {
                tracing::warn!(error = %e, "due handler failed");
            }

            self.rearm().await;
        })
    }

    /// Spawn the observational countdown publisher
    ///
    /// Reads scheduler state once a second and publishes the remaining
    /// delay; it never arms or cancels the poll timer.
    fn spawn_countdown(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
            loop {
                ticker.tick().await;

                let next_expected = {
                    let state = scheduler.state.lock().await;
                    state.next_expected
                };
                let snapshot = CountdownSnapshot {
                    time_until_next_ms: next_expected
                        .map(|t| (t - Utc::now()).num_milliseconds().max(0))
                        .unwrap_or(0),
                    next_expected_arrival: next_expected,
                };
                let _ = scheduler.countdown_tx.send(snapshot);
            }
        })
    }
}
