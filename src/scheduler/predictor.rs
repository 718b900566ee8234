//! Next-arrival prediction
//!
//! Takes the newest sample, adds the estimated interval, and corrects for
//! staleness: if the feed has gapped (or the scheduler was paused) the naive
//! candidate lands in the past, and firing on it would cause an immediate
//! burst of polls. Instead the candidate is advanced by whole intervals
//! until it is strictly in the future.

use super::{estimate_interval, score_confidence, SchedulerConfig};
use crate::model::Sample;
use chrono::{DateTime, Utc};

/// When the next reading is expected, and how much to trust that
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted arrival of the next sample; `None` when history is empty
    pub time: Option<DateTime<Utc>>,
    /// Regularity score in [0, 1]
    pub confidence: f64,
}

impl Prediction {
    /// A prediction with nothing to go on
    pub fn none() -> Self {
        Self {
            time: None,
            confidence: 0.0,
        }
    }
}

/// Predict when the source will publish its next sample
pub fn predict_next_arrival(
    samples: &[Sample],
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Prediction {
    let newest = match samples.iter().map(|s| s.timestamp).max() {
        Some(ts) => ts,
        None => return Prediction::none(),
    };

    let mut interval = estimate_interval(samples, config);
    if interval <= chrono::Duration::zero() {
        // A zero interval would make the staleness walk spin forever;
        // only reachable with a pathological plausible band.
        interval = config.default_interval();
    }
    let mut candidate = newest + interval;

    // Staleness correction: walk forward in whole intervals until the
    // candidate is strictly in the future.
    while candidate <= now {
        candidate += interval;
    }

    Prediction {
        time: Some(candidate),
        confidence: score_confidence(samples, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn regular_history(count: usize, gap_secs: i64) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample::new(at(i as i64 * gap_secs), 100.0))
            .collect()
    }

    #[test]
    fn test_empty_history_predicts_nothing() {
        let p = predict_next_arrival(&[], at(0), &SchedulerConfig::default());
        assert_eq!(p, Prediction::none());
    }

    #[test]
    fn test_regular_history_predicts_one_interval_out() {
        // Samples at t=0, 5m, 10m; at now=10m the next is due at 15m.
        let config = SchedulerConfig::default();
        let samples = regular_history(3, 300);

        let p = predict_next_arrival(&samples, at(600), &config);
        assert_eq!(p.time, Some(at(900)));
        assert!(p.confidence > 0.8);
    }

    #[test]
    fn test_stale_history_is_advanced_into_the_future() {
        // Newest sample 20 minutes ago, 5-minute cadence: the naive
        // candidate (15 minutes ago) must be walked forward past now.
        let config = SchedulerConfig::default();
        let samples = regular_history(5, 300);
        let newest = samples.last().unwrap().timestamp;
        let now = newest + Duration::minutes(20);

        let p = predict_next_arrival(&samples, now, &config);
        let predicted = p.time.unwrap();
        assert!(predicted > now);
        // Still phase-aligned with the sample grid.
        assert_eq!((predicted - newest).num_seconds() % 300, 0);
    }

    #[test]
    fn test_candidate_exactly_at_now_is_pushed_forward() {
        let config = SchedulerConfig::default();
        let samples = regular_history(3, 300);
        // now == newest + interval exactly; "strictly in the future" means
        // one more step.
        let p = predict_next_arrival(&samples, at(900), &config);
        assert_eq!(p.time, Some(at(1200)));
    }

    #[test]
    fn test_single_sample_uses_default_interval() {
        let config = SchedulerConfig::default();
        let samples = vec![Sample::new(at(0), 100.0)];

        let p = predict_next_arrival(&samples, at(0), &config);
        assert_eq!(p.time, Some(at(config.default_interval_secs as i64)));
        assert_eq!(p.confidence, 0.5);
    }
}
