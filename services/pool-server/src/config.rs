//! Configuration types and loading
//!
//! Config path precedence: CLI `--config` > `CONFIG_PATH` env var > the
//! default `rdp-pool.toml` in the working directory. All durations are
//! whole seconds in the TOML and validated non-zero at load time.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors from loading or validating the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Pool engine settings
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    /// Directory holding the set files and the event log.
    pub data_dir: PathBuf,
    /// How long a claim stays valid before the sweep reclaims it.
    #[serde(default = "default_lease_duration_secs")]
    pub lease_duration_secs: u64,
    /// Interval of the background expiry sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_lease_duration_secs() -> u64 {
    6 * 3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        if config.pool.lease_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "lease_duration_secs must be greater than 0".into(),
            ));
        }
        if config.pool.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if config.server.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("rdp-pool.toml")
    }
}
