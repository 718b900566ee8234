//! Reading sources
//!
//! A reading source is anything that can produce recent glucose history:
//! - Nightscout-compatible REST APIs (the real one)
//! - in-memory stubs for tests
//!
//! The poller and scheduler only see the trait, so swapping the backing
//! service never touches scheduling logic.

mod nightscout;

pub use nightscout::{NightscoutSource, SourceConfig};

use crate::model::GlucoseReading;
use async_trait::async_trait;

/// A provider of recent glucose readings
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Unique name for this source
    fn name(&self) -> &str;

    /// Fetch the most recent `count` readings, newest first
    async fn fetch_recent(&self, count: usize) -> Result<Vec<GlucoseReading>, SourceError>;
}

/// Errors that can occur while talking to a reading source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}
