//! Configuration management for the telemetry reader.
//!
//! Loaded with figment from defaults, an optional TOML file and `SMIPC_`
//! environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::context::ChannelKind;
use crate::error::{Error, Result};
use crate::IPC::cursor::OverrunPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory under the user config dir.
const CONFIG_DIR_NAME: &str = "smipc";

/// Environment variable prefix. Nested keys are separated by `__`,
/// e.g. `SMIPC_READ__TIMEOUT_MS=250`.
const ENV_PREFIX: &str = "SMIPC_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SMIPC_`)
/// 2. TOML config file at `~/.config/smipc/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub read: ReadConfig,
    pub monitor: MonitorConfig,
    pub fallback: FallbackConfig,
}

/// How channels read their segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Longest wait for the producer's semaphore, in milliseconds.
    pub timeout_ms: u64,
    /// `strict` fails a read on overrun, `lenient` zero-fills and counts.
    pub overrun_policy: OverrunPolicy,
    /// Age after which a sample is reported stale, in milliseconds.
    pub stale_after_ms: u64,
    /// Which GGA layout the producer writes.
    pub gga_layout: GgaLayout,
}

/// The two GGA payload revisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GgaLayout {
    /// 66 bytes with host timestamp.
    #[default]
    Current,
    /// 58 bytes with geoid separation.
    Legacy,
}

/// Background monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Channel names to watch.
    pub channels: Vec<String>,
    pub poll_interval_ms: u64,
}

/// Position reported when no receiver is publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            overrun_policy: OverrunPolicy::Strict,
            stale_after_ms: 5_000,
            gga_layout: GgaLayout::Current,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            channels: ChannelKind::ALL.iter().map(|k| k.name().to_string()).collect(),
            poll_interval_ms: 1_000,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            latitude_deg: 41.5,
            longitude_deg: -71.2,
            altitude_m: 0.0,
        }
    }
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.read.timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "read.timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.read.stale_after_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "read.stale_after_ms must be greater than 0".to_string(),
            });
        }

        if self.monitor.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "monitor.poll_interval_ms must be greater than 0".to_string(),
            });
        }

        for name in &self.monitor.channels {
            if ChannelKind::from_str(name).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!("monitor.channels: unknown channel `{name}`"),
                });
            }
        }

        let fallback = &self.fallback;
        if !(-90.0..=90.0).contains(&fallback.latitude_deg) {
            return Err(Error::ConfigValidation {
                message: format!("fallback.latitude_deg ({}) out of range", fallback.latitude_deg),
            });
        }
        if !(-180.0..=180.0).contains(&fallback.longitude_deg) {
            return Err(Error::ConfigValidation {
                message: format!("fallback.longitude_deg ({}) out of range", fallback.longitude_deg),
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read.timeout_ms)
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.read.stale_after_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.poll_interval_ms)
    }

    /// The monitored channels, parsed. Unknown names were rejected by `validate`.
    #[must_use]
    pub fn monitored_channels(&self) -> Vec<ChannelKind> {
        self.monitor
            .channels
            .iter()
            .filter_map(|name| ChannelKind::from_str(name).ok())
            .collect()
    }
}
