use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee_core::LockStore;
use marquee_service::{LogSignal, Metrics, Sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_service=info,marquee_store=info,marquee_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = marquee_store::app_config::Config::load()?;
    tracing::info!("starting marquee seat-lock sweeper");

    let store = marquee_store::connect(&config.store)?;
    // Fail fast: a sweeper that cannot reach the store is useless.
    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("lock store unreachable at startup: {}", e))?;

    let metrics = Arc::new(Metrics::new()?);
    let sweeper = Sweeper::new(
        store,
        Duration::from_secs(config.sweeper.interval_seconds),
        config.sweeper.reclaim_warn_threshold,
        Arc::new(LogSignal),
        metrics,
    );
    tracing::info!(
        "sweeping every {}s, warning above {} reclaimed locks per pass",
        config.sweeper.interval_seconds,
        config.sweeper.reclaim_warn_threshold
    );
    let handle = sweeper.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
