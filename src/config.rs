use std::{path::Path, time::Duration};

use config::{Config, ConfigError};
use serde::Deserialize;

const ENV_PREFIX: &str = "AERO_FEED";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How long to wait before starting a feed again after it failed or ended
    /// on its own.
    pub restart_delay_ms: u64,
}

impl SupervisorConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AeroFeedConfig {
    pub discovery: af_discovery::DiscoveryConfig,
    pub pipeline: af_pipeline::PipelineConfig,
    pub supervisor: SupervisorConfig,
}

impl AeroFeedConfig {
    /// Reads `aero-feed.{toml,json,yaml,...}` from the working directory if
    /// there is one, then applies `AERO_FEED_*` environment overrides.
    pub fn read() -> Result<Self, ConfigError> {
        let mut c = Config::new();

        c.merge(config::File::with_name("aero-feed").required(false))?;
        c.merge(config::Environment::with_prefix(ENV_PREFIX).separator("__"))?;

        c.try_into()
    }

    pub fn read_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut c = Config::new();

        c.merge(config::File::from(path))?;
        c.merge(config::Environment::with_prefix(ENV_PREFIX).separator("__"))?;

        c.try_into()
    }
}
