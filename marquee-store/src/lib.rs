use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use marquee_core::LockStore;

pub mod app_config;
pub mod memory;
pub mod redis_store;

pub use memory::MemoryLockStore;
pub use redis_store::RedisLockStore;

/// Builds the configured lock store. `memory` backs dev and tests,
/// `redis` backs production.
pub fn connect(cfg: &app_config::StoreConfig) -> Result<Arc<dyn LockStore>, config::ConfigError> {
    match cfg.provider.as_str() {
        "redis" => {
            info!("using redis lock store at {}", cfg.redis_url);
            let store = RedisLockStore::connect(
                &cfg.redis_url,
                Duration::from_millis(cfg.op_timeout_ms),
            )
            .map_err(|e| config::ConfigError::Message(format!("redis: {}", e)))?;
            Ok(Arc::new(store))
        }
        "memory" => {
            info!("using in-memory lock store");
            Ok(Arc::new(MemoryLockStore::new()))
        }
        other => Err(config::ConfigError::Message(format!(
            "unknown store provider '{}', expected 'memory' or 'redis'",
            other
        ))),
    }
}
