//! Polling loop
//!
//! The `Poller` ties a reading source to the adaptive scheduler: when the
//! scheduler decides a poll is due, the poller fetches fresh entries,
//! replaces the analysis history wholesale, and feeds it back so the next
//! prediction works from current data. The latest reading is published on a
//! watch channel for presentation layers.
//!
//! Fetch failures never stop the loop; they are recorded in `PollerStatus`
//! and the scheduler re-arms regardless.

use crate::model::{GlucoseReading, Sample};
use crate::scheduler::{DueHandler, ReadingScheduler};
use crate::source::{ReadingSource, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tokio::sync::{watch, RwLock};

/// Read-only snapshot of the polling loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerStatus {
    /// When the last successful fetch completed
    pub last_fetch: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared on success
    pub last_error: Option<String>,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Readings returned by the last successful fetch
    pub readings_fetched: usize,
}

/// Drives fetches against a reading source on the scheduler's cadence
pub struct Poller {
    source: Arc<dyn ReadingSource>,
    fetch_count: usize,
    scheduler: OnceLock<Arc<ReadingScheduler>>,
    state: RwLock<PollerStatus>,
    latest_tx: watch::Sender<Option<GlucoseReading>>,
}

impl Poller {
    /// Create a poller over the given source
    pub fn new(source: Arc<dyn ReadingSource>, fetch_count: usize) -> Arc<Self> {
        let (latest_tx, _) = watch::channel(None);
        Arc::new(Self {
            source,
            fetch_count,
            scheduler: OnceLock::new(),
            state: RwLock::new(PollerStatus::default()),
            latest_tx,
        })
    }

    /// Wire up the scheduler that will drive this poller
    ///
    /// Must be called exactly once, before `start`.
    pub fn attach_scheduler(&self, scheduler: Arc<ReadingScheduler>) {
        if self.scheduler.set(scheduler).is_err() {
            tracing::warn!("scheduler already attached, ignoring");
        }
    }

    /// Perform the initial fetch and start adaptive scheduling
    ///
    /// A failed initial fetch is tolerated: the scheduler starts with an
    /// empty history and degrades to fixed-interval polling until data
    /// arrives.
    pub async fn start(&self) {
        let history = match self.fetch_once().await {
            Ok(readings) => readings.iter().map(GlucoseReading::sample).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "initial fetch failed, starting with empty history");
                Vec::new()
            }
        };

        if let Some(scheduler) = self.scheduler.get() {
            scheduler.start(history).await;
        } else {
            tracing::error!("no scheduler attached, polling will not run");
        }
    }

    /// Stop the scheduling loop
    pub async fn stop(&self) {
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.stop().await;
        }
    }

    /// Subscribe to the latest-reading feed
    pub fn latest(&self) -> watch::Receiver<Option<GlucoseReading>> {
        self.latest_tx.subscribe()
    }

    /// Current polling status
    pub async fn status(&self) -> PollerStatus {
        self.state.read().await.clone()
    }

    /// Fetch one batch, update status bookkeeping, publish the newest reading
    pub async fn fetch_once(&self) -> Result<Vec<GlucoseReading>, SourceError> {
        let result = self.source.fetch_recent(self.fetch_count).await;
        let mut state = self.state.write().await;

        match &result {
            Ok(readings) => {
                state.last_fetch = Some(Utc::now());
                state.last_error = None;
                state.consecutive_failures = 0;
                state.readings_fetched = readings.len();

                if let Some(newest) = readings.first() {
                    tracing::info!(
                        mgdl = newest.mgdl,
                        trend = %newest.trend.map(|t| t.arrow()).unwrap_or("-"),
                        count = readings.len(),
                        "fetched readings"
                    );
                    let _ = self.latest_tx.send(Some(newest.clone()));
                }
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                state.consecutive_failures += 1;
                tracing::warn!(
                    error = %e,
                    consecutive_failures = state.consecutive_failures,
                    "fetch failed"
                );
            }
        }

        result
    }
}

#[async_trait]
impl DueHandler for Poller {
    async fn on_due(&self) -> anyhow::Result<()> {
        let readings = self.fetch_once().await?;
        let history: Vec<Sample> = readings.iter().map(GlucoseReading::sample).collect();

        // Replace the scheduler's analysis window so the re-arm after this
        // handler works from current data.
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.on_new_data(history).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrendDirection;
    use crate::scheduler::{ScheduleMode, SchedulerConfig};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed batch of readings on every fetch, counting calls
    struct StubSource {
        readings: Vec<GlucoseReading>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubSource {
        fn with_regular_history(count: usize, gap_secs: i64) -> Arc<Self> {
            let now = Utc::now();
            let readings = (0..count)
                .map(|i| {
                    GlucoseReading::new(now - Duration::seconds(gap_secs * i as i64), 110.0)
                        .trend(TrendDirection::Flat)
                })
                .collect();
            Arc::new(Self {
                readings,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                readings: Vec::new(),
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReadingSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch_recent(&self, _count: usize) -> Result<Vec<GlucoseReading>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Unavailable);
            }
            Ok(self.readings.clone())
        }
    }

    fn build(source: Arc<StubSource>) -> (Arc<Poller>, Arc<ReadingScheduler>) {
        let poller = Poller::new(source, 24);
        let scheduler = ReadingScheduler::new(SchedulerConfig::default(), poller.clone());
        poller.attach_scheduler(scheduler.clone());
        (poller, scheduler)
    }

    #[tokio::test]
    async fn test_fetch_once_updates_status_and_latest() {
        let source = StubSource::with_regular_history(5, 300);
        let (poller, _scheduler) = build(source);

        let mut latest = poller.latest();
        assert!(latest.borrow().is_none());

        let readings = poller.fetch_once().await.unwrap();
        assert_eq!(readings.len(), 5);

        let status = poller.status().await;
        assert!(status.last_fetch.is_some());
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.readings_fetched, 5);

        let newest = latest.borrow_and_update().clone().unwrap();
        assert_eq!(newest.mgdl, 110.0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recorded_not_fatal() {
        let source = StubSource::failing();
        let (poller, _scheduler) = build(source.clone());

        assert!(poller.fetch_once().await.is_err());
        assert!(poller.fetch_once().await.is_err());

        let status = poller.status().await;
        assert_eq!(status.consecutive_failures, 2);
        assert!(status.last_error.is_some());
        assert!(status.last_fetch.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_and_schedules_next_poll() {
        let source = StubSource::with_regular_history(5, 300);
        let (poller, scheduler) = build(source.clone());

        poller.start().await;
        assert_eq!(source.calls(), 1);

        let status = scheduler.status().await;
        assert!(status.active);
        assert_eq!(status.mode, ScheduleMode::Predictive);

        // The scheduled tick fires one interval plus buffer later and
        // fetches again.
        tokio::time::sleep(std::time::Duration::from_secs(340)).await;
        assert_eq!(source.calls(), 2);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_initial_fetch_degrades_to_fixed_interval() {
        let source = StubSource::failing();
        let (poller, scheduler) = build(source.clone());

        poller.start().await;
        assert_eq!(source.calls(), 1);

        let status = scheduler.status().await;
        assert!(status.active);
        assert_eq!(status.mode, ScheduleMode::FixedInterval);

        // The loop keeps retrying on the fallback cadence despite errors.
        tokio::time::sleep(std::time::Duration::from_secs(340)).await;
        assert_eq!(source.calls(), 2);

        poller.stop().await;
    }
}
