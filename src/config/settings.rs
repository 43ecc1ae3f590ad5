//! Optional `config.toml` settings.
//!
//! Every key is optional; a missing file yields the defaults.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 8080
//!
//! [stream]
//! poll_interval_ms = 1000
//! max_duration_ms = 30000
//! max_ticks = 25
//! retry_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{CldError, Result};
use crate::stream::StreamConfig;

/// Top-level settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub stream: StreamSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Change-notification stream budgets, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSettings {
    pub poll_interval_ms: u64,
    pub max_duration_ms: u64,
    pub max_ticks: u32,
    pub retry_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        let config = StreamConfig::default();
        Self {
            poll_interval_ms: duration_ms(config.poll_interval),
            max_duration_ms: duration_ms(config.max_duration),
            max_ticks: config.max_ticks,
            retry_ms: duration_ms(config.retry),
        }
    }
}

impl StreamSettings {
    /// Converts to the stream module's runtime configuration.
    pub fn to_stream_config(&self) -> Result<StreamConfig> {
        if self.poll_interval_ms == 0 {
            return Err(CldError::Other(
                "stream.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(StreamConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_duration: Duration::from_millis(self.max_duration_ms),
            max_ticks: self.max_ticks,
            retry: Duration::from_millis(self.retry_ms),
        })
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Settings {
    /// Loads settings from `path`, or defaults if the file does not exist.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml(&content).map_err(|e| match e {
            CldError::Other(msg) => CldError::Other(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Parses settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CldError::Other(format!("Invalid settings: {e}")))
    }
}
