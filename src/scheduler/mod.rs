//! Adaptive Reading Scheduler
//!
//! Infers the CGM sensor's natural sampling cadence from recent history,
//! predicts when the next reading will land, and fires a callback at (or
//! shortly after) that moment instead of polling on a fixed timer.
//!
//! The module splits into a pure core and a runtime shell:
//! - [`estimator`]: interval estimation and confidence scoring (pure)
//! - [`predictor`]: next-arrival prediction with staleness correction (pure)
//! - [`runtime`]: the `ReadingScheduler` state machine driving tokio timers

mod estimator;
mod predictor;
mod runtime;

pub use estimator::{estimate_interval, score_confidence};
pub use predictor::{predict_next_arrival, Prediction};
pub use runtime::{
    CountdownSnapshot, DueHandler, ReadingScheduler, ScheduleMode, SchedulerStatus,
};

use serde::Deserialize;

/// Tuning knobs for interval estimation and scheduling
///
/// The defaults match a 5-minute CGM cadence; every value is overridable
/// from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How many of the most recent samples the estimator looks at
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Gaps shorter than this are discarded as duplicates/backfill artifacts
    #[serde(default = "default_min_plausible_secs")]
    pub min_plausible_secs: u64,

    /// Gaps longer than this are discarded as feed outages
    #[serde(default = "default_max_plausible_secs")]
    pub max_plausible_secs: u64,

    /// Interval assumed when history is too thin to estimate from
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,

    /// Extra delay past the predicted arrival, covering the source's own
    /// publication latency
    #[serde(default = "default_fixed_buffer_secs")]
    pub fixed_buffer_secs: u64,

    /// Confidence never drops below this, so scheduling is never starved
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    /// Below this confidence the scheduler ignores predictions and falls
    /// back to a fixed repeating interval
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,

    /// The fixed repeating interval used in the low-confidence fallback
    #[serde(default = "default_fallback_interval_secs")]
    pub fallback_interval_secs: u64,
}

fn default_recent_window() -> usize {
    10
}

fn default_min_plausible_secs() -> u64 {
    180 // 3 minutes
}

fn default_max_plausible_secs() -> u64 {
    480 // 8 minutes
}

fn default_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_fixed_buffer_secs() -> u64 {
    30
}

fn default_confidence_floor() -> f64 {
    0.2
}

fn default_low_confidence_threshold() -> f64 {
    0.3
}

fn default_fallback_interval_secs() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            recent_window: default_recent_window(),
            min_plausible_secs: default_min_plausible_secs(),
            max_plausible_secs: default_max_plausible_secs(),
            default_interval_secs: default_interval_secs(),
            fixed_buffer_secs: default_fixed_buffer_secs(),
            confidence_floor: default_confidence_floor(),
            low_confidence_threshold: default_low_confidence_threshold(),
            fallback_interval_secs: default_fallback_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    /// The default interval as a chrono duration
    pub fn default_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_interval_secs as i64)
    }
}
