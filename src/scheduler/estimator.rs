//! Interval estimation and confidence scoring
//!
//! Pure functions over a sample history. The estimator answers "how far
//! apart do readings arrive in steady state", the scorer answers "how much
//! should we trust that number". Both work from the same filtered gap set:
//! gaps between consecutive samples in the recent window, with anything
//! outside the plausible band discarded (duplicates, backfill, outage
//! recovery all produce gaps a live sensor never would).

use super::SchedulerConfig;
use crate::model::Sample;
use chrono::Duration;

/// Estimate the source's steady-state sampling interval
///
/// Sorts the history itself; caller ordering is not assumed. Uses the median
/// of the surviving gaps so a single outage gap cannot skew the estimate.
/// Falls back to the configured default when history has fewer than 2
/// samples or no gap survives filtering.
pub fn estimate_interval(samples: &[Sample], config: &SchedulerConfig) -> Duration {
    let mut gaps = plausible_gaps(samples, config);
    if gaps.is_empty() {
        return config.default_interval();
    }

    gaps.sort_unstable();
    let mid = gaps.len() / 2;
    let median_secs = if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) / 2
    } else {
        gaps[mid]
    };

    Duration::seconds(median_secs)
}

/// Score how consistent recent intervals are, in [0, 1]
///
/// Computed as `1 - coefficient_of_variation` over the filtered gap set,
/// clamped to the configured floor so low confidence degrades scheduling
/// instead of starving it. Fewer than 3 samples is not enough evidence in
/// either direction and returns a fixed moderate score.
pub fn score_confidence(samples: &[Sample], config: &SchedulerConfig) -> f64 {
    if samples.len() < 3 {
        return 0.5;
    }

    let gaps = plausible_gaps(samples, config);
    if gaps.len() < 2 {
        return 0.5;
    }

    let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
    if mean <= 0.0 {
        return config.confidence_floor;
    }

    let variance = gaps
        .iter()
        .map(|&g| {
            let d = g as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / gaps.len() as f64;
    let cv = variance.sqrt() / mean;

    (1.0 - cv).clamp(config.confidence_floor, 1.0)
}

/// Gaps (in whole seconds) between consecutive samples in the recent
/// window, newest first, filtered to the plausible band
fn plausible_gaps(samples: &[Sample], config: &SchedulerConfig) -> Vec<i64> {
    if samples.len() < 2 {
        return Vec::new();
    }

    let mut recent: Vec<&Sample> = samples.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent.truncate(config.recent_window);

    let min = config.min_plausible_secs as i64;
    let max = config.max_plausible_secs as i64;

    recent
        .windows(2)
        .map(|pair| (pair[0].timestamp - pair[1].timestamp).num_seconds())
        .filter(|&gap| gap >= min && gap <= max)
        .collect()
}
