use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds between out-of-band sweeps of expired assets.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

fn default_max_connections() -> u32 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("VERIFICATION_").from_env::<Config>()
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
