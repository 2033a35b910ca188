use serde::Deserialize;
use std::env;

use marquee_core::model::LockRules;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub locks: LockRules,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub provider: String,
    pub redis_url: String,
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_warn_threshold")]
    pub reclaim_warn_threshold: usize,
}

fn default_op_timeout_ms() -> u64 {
    200
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_warn_threshold() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval(),
            reclaim_warn_threshold: default_warn_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            locks: LockRules::default(),
            sweeper: SweeperConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer the current environment's file on top (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables win, e.g. MARQUEE_STORE__REDIS_URL
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
