//! Core data types for glucose readings
//!
//! This module defines the normalized shapes used throughout the crate:
//! - `Sample`: a timestamped numeric observation, the scheduler's input
//! - `GlucoseReading`: one CGM entry with trend metadata
//! - `TrendDirection`: the sensor-reported rate-of-change arrow
//! - `EntryDto`: the wire shape, normalized at the boundary
//!
//! Upstream entry feeds are inconsistent about field names (epoch millis in
//! `date`, RFC 3339 in `dateString`, the value in `sgv`). All of that is
//! resolved here, once, so nothing downstream branches on wire variants.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped observation
///
/// The scheduler and estimator operate on samples only; they never see the
/// richer reading type. Immutable once constructed; ordered by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the source produced the observation
    pub timestamp: DateTime<Utc>,
    /// The measured value
    pub value: f64,
}

impl Sample {
    /// Create a sample at a specific time
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Sensor-reported trend direction, as published by Nightscout-compatible feeds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrendDirection {
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
    NotComputable,
    RateOutOfRange,
}

impl TrendDirection {
    /// Parse the direction string the feed publishes
    ///
    /// Unknown strings map to `None` rather than an error; trend is
    /// decorative and must never fail a fetch.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DoubleUp" => Some(TrendDirection::DoubleUp),
            "SingleUp" => Some(TrendDirection::SingleUp),
            "FortyFiveUp" => Some(TrendDirection::FortyFiveUp),
            "Flat" => Some(TrendDirection::Flat),
            "FortyFiveDown" => Some(TrendDirection::FortyFiveDown),
            "SingleDown" => Some(TrendDirection::SingleDown),
            "DoubleDown" => Some(TrendDirection::DoubleDown),
            "NOT COMPUTABLE" | "NotComputable" => Some(TrendDirection::NotComputable),
            "RATE OUT OF RANGE" | "RateOutOfRange" => Some(TrendDirection::RateOutOfRange),
            _ => None,
        }
    }

    /// Arrow glyph for display
    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::DoubleUp => "⇈",
            TrendDirection::SingleUp => "↑",
            TrendDirection::FortyFiveUp => "↗",
            TrendDirection::Flat => "→",
            TrendDirection::FortyFiveDown => "↘",
            TrendDirection::SingleDown => "↓",
            TrendDirection::DoubleDown => "⇊",
            TrendDirection::NotComputable => "?",
            TrendDirection::RateOutOfRange => "!",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.arrow())
    }
}

/// One normalized CGM reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    /// When the sensor recorded the reading
    pub timestamp: DateTime<Utc>,
    /// Glucose in mg/dL (the feed's native unit)
    pub mgdl: f64,
    /// Sensor-reported trend, when the feed provides one
    pub trend: Option<TrendDirection>,
    /// Reporting device identifier, when the feed provides one
    pub device: Option<String>,
}

impl GlucoseReading {
    /// Create a reading with no trend/device metadata
    pub fn new(timestamp: DateTime<Utc>, mgdl: f64) -> Self {
        Self {
            timestamp,
            mgdl,
            trend: None,
            device: None,
        }
    }

    /// Builder method: set the trend direction
    pub fn trend(mut self, trend: TrendDirection) -> Self {
        self.trend = Some(trend);
        self
    }

    /// Builder method: set the reporting device
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Glucose in mmol/L
    pub fn mmol(&self) -> f64 {
        self.mgdl / 18.0182
    }

    /// The reading viewed as a scheduler sample
    pub fn sample(&self) -> Sample {
        Sample::new(self.timestamp, self.mgdl)
    }
}

/// Wire shape of one entry from the REST feed
///
/// Both timestamp encodings are optional on the wire; `date` (epoch millis)
/// wins when present since it avoids a string parse.
#[derive(Debug, Deserialize)]
pub struct EntryDto {
    /// Epoch milliseconds
    pub date: Option<i64>,
    /// RFC 3339 string, some deployments send only this
    #[serde(rename = "dateString")]
    pub date_string: Option<String>,
    /// Sensor glucose value in mg/dL
    pub sgv: Option<f64>,
    pub direction: Option<String>,
    pub device: Option<String>,
}

impl EntryDto {
    /// Normalize into a `GlucoseReading`
    ///
    /// Returns `None` when the entry carries no usable timestamp or value
    /// (calibration records and some uploader heartbeats look like this).
    pub fn normalize(self) -> Option<GlucoseReading> {
        let timestamp = match self.date {
            Some(millis) => Utc.timestamp_millis_opt(millis).single()?,
            None => self
                .date_string
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))?,
        };

        let mgdl = self.sgv?;
        if !mgdl.is_finite() || mgdl <= 0.0 {
            return None;
        }

        let mut reading = GlucoseReading::new(timestamp, mgdl);
        if let Some(direction) = self.direction.as_deref().and_then(TrendDirection::parse) {
            reading = reading.trend(direction);
        }
        if let Some(device) = self.device {
            reading = reading.device(device);
        }
        Some(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_epoch_millis() {
        let dto: EntryDto = serde_json::from_str(
            r#"{"date": 1700000000000, "sgv": 120, "direction": "Flat", "device": "xDrip"}"#,
        )
        .unwrap();

        let reading = dto.normalize().unwrap();
        assert_eq!(reading.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(reading.mgdl, 120.0);
        assert_eq!(reading.trend, Some(TrendDirection::Flat));
        assert_eq!(reading.device.as_deref(), Some("xDrip"));
    }

    #[test]
    fn test_normalize_date_string_fallback() {
        let dto: EntryDto = serde_json::from_str(
            r#"{"dateString": "2023-11-14T22:13:20+00:00", "sgv": 95.5}"#,
        )
        .unwrap();

        let reading = dto.normalize().unwrap();
        assert_eq!(reading.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(reading.mgdl, 95.5);
        assert!(reading.trend.is_none());
    }

    #[test]
    fn test_normalize_rejects_unusable_entries() {
        let no_timestamp: EntryDto = serde_json::from_str(r#"{"sgv": 100}"#).unwrap();
        assert!(no_timestamp.normalize().is_none());

        let no_value: EntryDto = serde_json::from_str(r#"{"date": 1700000000000}"#).unwrap();
        assert!(no_value.normalize().is_none());

        let zero_value: EntryDto =
            serde_json::from_str(r#"{"date": 1700000000000, "sgv": 0}"#).unwrap();
        assert!(zero_value.normalize().is_none());
    }

    #[test]
    fn test_unknown_direction_is_ignored() {
        let dto: EntryDto = serde_json::from_str(
            r#"{"date": 1700000000000, "sgv": 110, "direction": "Sideways"}"#,
        )
        .unwrap();

        let reading = dto.normalize().unwrap();
        assert!(reading.trend.is_none());
    }

    #[test]
    fn test_mmol_conversion() {
        let reading = GlucoseReading::new(Utc::now(), 180.0);
        assert!((reading.mmol() - 9.99).abs() < 0.01);
    }

    #[test]
    fn test_reading_to_sample() {
        let now = Utc::now();
        let sample = GlucoseReading::new(now, 140.0).sample();
        assert_eq!(sample.timestamp, now);
        assert_eq!(sample.value, 140.0);
    }
}
