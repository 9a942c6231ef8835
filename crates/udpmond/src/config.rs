//! Daemon configuration.
//!
//! Built-in defaults, optionally overridden by a TOML file, then by the
//! command line. Only the binary applies command-line overrides; everything
//! here is plain data plus loading and validation.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::engine::EngineConfig;
use crate::liveness::{DEFAULT_LIVENESS_TIMEOUT, DEFAULT_SWEEP_INTERVAL};
use crate::transport::DEFAULT_MAX_DATAGRAM_BYTES;

/// Port receiving session announcements and join requests.
pub const DEFAULT_STARTUP_PORT: u16 = 7106;

/// Port receiving heartbeats.
pub const DEFAULT_HEARTBEAT_PORT: u16 = 7104;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the daemon needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Address the UDP sockets bind to
    pub bind_address: IpAddr,

    /// One socket per port: startup port first, then heartbeat port
    pub ports: Vec<u16>,

    /// How often the status report is rendered
    #[serde(rename = "report_interval_secs", with = "duration_secs")]
    pub report_interval: Duration,

    /// How long one intake cycle waits for datagrams
    #[serde(rename = "poll_timeout_secs", with = "duration_secs")]
    pub poll_timeout: Duration,

    /// Silence after which a machine is marked offline
    #[serde(rename = "liveness_timeout_secs", with = "duration_secs")]
    pub liveness_timeout: Duration,

    /// Period of the sweep that runs regardless of traffic
    #[serde(rename = "sweep_interval_ms", with = "duration_millis")]
    pub sweep_interval: Duration,

    /// Largest accepted datagram
    pub max_datagram_bytes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ports: vec![DEFAULT_STARTUP_PORT, DEFAULT_HEARTBEAT_PORT],
            report_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(15),
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_datagram_bytes: DEFAULT_MAX_DATAGRAM_BYTES,
        }
    }
}

impl MonitorConfig {
    /// Loads the config file at `path`, or the default file if `path` is
    /// `None`. A missing default file yields the built-in defaults; a
    /// missing explicit file is an error.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NotFound` if an explicit `path` does not exist
    /// - `ConfigError::Read` / `ConfigError::Parse` if the file is unusable
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => load_config(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    load_config(&path)
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Checks that the daemon can run with these values.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Invalid` naming the first offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.is_empty() {
            return Err(ConfigError::Invalid("at least one port is required".to_string()));
        }

        let durations = [
            ("report_interval_secs", self.report_interval),
            ("poll_timeout_secs", self.poll_timeout),
            ("liveness_timeout_secs", self.liveness_timeout),
            ("sweep_interval_ms", self.sweep_interval),
        ];
        if let Some((key, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Invalid(format!("{key} must be greater than zero")));
        }

        if self.max_datagram_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_datagram_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            liveness_timeout: self.liveness_timeout,
            sweep_interval: self.sweep_interval,
        }
    }
}

/// `<config_dir>/udpmon`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("udpmon")
}

/// `<config_dir>/udpmon/config.toml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

fn load_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: MonitorConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// `Duration` as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// `Duration` as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
