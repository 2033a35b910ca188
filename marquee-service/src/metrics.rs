use prometheus::{IntCounter, Registry};

/// Counters for the lock service's operational surface. The registry is
/// exposed so the embedding process can gather and export it.
pub struct Metrics {
    pub registry: Registry,
    pub locks_acquired: IntCounter,
    pub lock_conflicts: IntCounter,
    pub locks_released: IntCounter,
    pub locks_extended: IntCounter,
    pub locks_lost: IntCounter,
    pub locks_reclaimed: IntCounter,
    pub reclaim_spikes: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let locks_acquired =
            IntCounter::new("marquee_locks_acquired_total", "Seat locks acquired")?;
        let lock_conflicts = IntCounter::new(
            "marquee_lock_conflicts_total",
            "Seats refused at acquisition",
        )?;
        let locks_released =
            IntCounter::new("marquee_locks_released_total", "Seat locks released by holders")?;
        let locks_extended =
            IntCounter::new("marquee_locks_extended_total", "Seat lock expiries extended")?;
        let locks_lost = IntCounter::new(
            "marquee_locks_lost_total",
            "Extend attempts on locks no longer owned",
        )?;
        let locks_reclaimed = IntCounter::new(
            "marquee_locks_reclaimed_total",
            "Expired locks reclaimed by the sweeper",
        )?;
        let reclaim_spikes = IntCounter::new(
            "marquee_reclaim_spikes_total",
            "Sweep passes whose reclamation count exceeded the warning threshold",
        )?;

        for counter in [
            &locks_acquired,
            &lock_conflicts,
            &locks_released,
            &locks_extended,
            &locks_lost,
            &locks_reclaimed,
            &reclaim_spikes,
        ] {
            registry.register(Box::new(counter.clone()))?;
        }

        Ok(Self {
            registry,
            locks_acquired,
            lock_conflicts,
            locks_released,
            locks_extended,
            locks_lost,
            locks_reclaimed,
            reclaim_spikes,
        })
    }
}
