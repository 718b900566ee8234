//! Nightscout REST API source
//!
//! HTTP client for the entries endpoint of a Nightscout-compatible server.
//! Authentication is a static bearer token passed through as supplied; the
//! server is an external, pre-existing service and its API shapes are
//! normalized at this boundary via `EntryDto`.

use super::{ReadingSource, SourceError};
use crate::model::{EntryDto, GlucoseReading};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Configuration for a Nightscout-compatible source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the server (e.g. "https://cgm.example.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static bearer token, when the server requires one
    pub token: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How many entries to request per fetch
    #[serde(default = "default_fetch_count")]
    pub fetch_count: usize,
}

fn default_base_url() -> String {
    "http://localhost:1337".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_fetch_count() -> usize {
    24
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout_ms: default_request_timeout_ms(),
            fetch_count: default_fetch_count(),
        }
    }
}

/// Nightscout-compatible REST source
pub struct NightscoutSource {
    client: Client,
    config: SourceConfig,
}

impl NightscoutSource {
    /// Create a source with the given configuration
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// The current configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Check whether the server is reachable
    pub async fn health_check(&self) -> Result<(), SourceError> {
        let url = format!("{}/api/v1/status.json", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SourceError::Unavailable)
        }
    }
}

#[async_trait]
impl ReadingSource for NightscoutSource {
    fn name(&self) -> &str {
        "nightscout"
    }

    async fn fetch_recent(&self, count: usize) -> Result<Vec<GlucoseReading>, SourceError> {
        let url = format!("{}/api/v1/entries/sgv.json", self.config.base_url);

        let mut request = self.client.get(&url).query(&[("count", count.to_string())]);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let entries: Vec<EntryDto> = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        // Calibration records and malformed entries are dropped, not fatal.
        let mut readings: Vec<GlucoseReading> =
            entries.into_iter().filter_map(EntryDto::normalize).collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(readings)
    }
}

/// Map reqwest transport failures onto the source error taxonomy
fn classify_transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else if e.is_connect() {
        SourceError::Unavailable
    } else {
        SourceError::Request(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();
        assert_eq!(config.base_url, "http://localhost:1337");
        assert!(config.token.is_none());
        assert_eq!(config.fetch_count, 24);
    }

    #[test]
    fn test_source_name() {
        let source = NightscoutSource::new(SourceConfig::default()).unwrap();
        assert_eq!(source.name(), "nightscout");
    }

    #[test]
    fn test_entry_batch_parses_and_sorts() {
        // Shape as served by the entries endpoint: mixed entries, not
        // guaranteed newest-first.
        let body = r#"[
            {"date": 1700000300000, "sgv": 118, "direction": "Flat", "device": "g6"},
            {"date": 1700000600000, "sgv": 121, "direction": "FortyFiveUp", "device": "g6"},
            {"type": "cal", "date": 1700000000000},
            {"date": 1700000000000, "sgv": 115, "direction": "Flat", "device": "g6"}
        ]"#;

        let entries: Vec<EntryDto> = serde_json::from_str(body).unwrap();
        let mut readings: Vec<GlucoseReading> =
            entries.into_iter().filter_map(EntryDto::normalize).collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].mgdl, 121.0);
        assert_eq!(readings[2].mgdl, 115.0);
        assert!(readings[0].timestamp > readings[1].timestamp);
    }
}
