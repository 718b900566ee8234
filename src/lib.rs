//! # Glucowatch
//!
//! Adaptive CGM polling service. Fetches glucose readings from a
//! Nightscout-compatible REST API and polls in step with the sensor's own
//! cadence instead of on a fixed timer.
//!
//! ## How it works
//!
//! - **Interval estimation**: the median gap between recent readings,
//!   filtered to a plausible band, gives the sensor's steady-state cadence
//! - **Prediction**: the next reading is expected one interval after the
//!   newest sample, corrected forward when the feed has gapped
//! - **Confidence**: regular histories schedule predictively; irregular
//!   ones degrade to fixed-interval polling
//!
//! ## Modules
//!
//! - [`scheduler`]: the adaptive reading scheduler
//! - [`source`]: reading sources (Nightscout REST client)
//! - [`poller`]: the fetch loop tying source and scheduler together
//! - [`model`]: normalized reading and sample types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glucowatch::poller::Poller;
//! use glucowatch::scheduler::{ReadingScheduler, SchedulerConfig};
//! use glucowatch::source::{NightscoutSource, SourceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(NightscoutSource::new(SourceConfig::default())?);
//!
//!     let poller = Poller::new(source, 24);
//!     let scheduler = ReadingScheduler::new(SchedulerConfig::default(), poller.clone());
//!     poller.attach_scheduler(scheduler.clone());
//!
//!     // Initial fetch, then adaptive polling until stopped.
//!     poller.start().await;
//!
//!     let mut latest = poller.latest();
//!     latest.changed().await?;
//!     if let Some(reading) = latest.borrow().clone() {
//!         println!("current: {} mg/dL", reading.mgdl);
//!     }
//!
//!     poller.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod model;
pub mod poller;
pub mod scheduler;
pub mod source;

// Re-export top-level types for convenience
pub use model::{GlucoseReading, Sample, TrendDirection};

pub use scheduler::{
    estimate_interval, predict_next_arrival, score_confidence, CountdownSnapshot, DueHandler,
    Prediction, ReadingScheduler, ScheduleMode, SchedulerConfig, SchedulerStatus,
};

pub use source::{NightscoutSource, ReadingSource, SourceConfig, SourceError};

pub use poller::{Poller, PollerStatus};

pub use config::{Config, ConfigError, LoggingConfig};
