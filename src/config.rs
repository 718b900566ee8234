//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::scheduler::SchedulerConfig;
use crate::source::SourceConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("glucowatch").join("config.toml")),
            Some(PathBuf::from("/etc/glucowatch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Source overrides
        if let Ok(url) = std::env::var("GLUCOWATCH_URL") {
            self.source.base_url = url;
        }
        if let Ok(token) = std::env::var("GLUCOWATCH_TOKEN") {
            if !token.is_empty() {
                self.source.token = Some(token);
            }
        }
        if let Ok(count) = std::env::var("GLUCOWATCH_FETCH_COUNT") {
            if let Ok(c) = count.parse() {
                self.source.fetch_count = c;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("GLUCOWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GLUCOWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Glucowatch Configuration
#
# Environment variables override these settings:
# - GLUCOWATCH_URL
# - GLUCOWATCH_TOKEN
# - GLUCOWATCH_FETCH_COUNT
# - GLUCOWATCH_LOG_LEVEL
# - GLUCOWATCH_LOG_FORMAT

[source]
# Base URL of the Nightscout-compatible server
base_url = "http://localhost:1337"

# Static bearer token (leave unset for open servers)
# token = ""

# Request timeout (ms)
request_timeout_ms = 10000

# Entries to request per fetch
fetch_count = 24

[scheduler]
# Samples the interval estimator considers
recent_window = 10

# Plausible band for sample gaps (seconds); gaps outside are treated as
# duplicates or feed outages and ignored
min_plausible_secs = 180
max_plausible_secs = 480

# Interval assumed when history is too thin to estimate from (seconds)
default_interval_secs = 300

# Extra delay past the predicted arrival, covering publication lag (seconds)
fixed_buffer_secs = 30

# Confidence floor and the threshold below which the scheduler falls back
# to fixed-interval polling
confidence_floor = 0.2
low_confidence_threshold = 0.3

# Fixed fallback polling interval (seconds)
fallback_interval_secs = 300

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.source.base_url, "http://localhost:1337");
        assert_eq!(config.scheduler.default_interval_secs, 300);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[source]\nbase_url = \"https://cgm.example.com\"\ntoken = \"abc123\""
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.base_url, "https://cgm.example.com");
        assert_eq!(config.source.token.as_deref(), Some("abc123"));
        // Untouched sections fall back to defaults.
        assert_eq!(config.scheduler.recent_window, 10);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load(Path::new("/nonexistent/glucowatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[source\nbase_url = 12").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
