use tracing::warn;

/// Sink for operational signals the sweeper raises. Observational only;
/// locking behavior never depends on it.
pub trait OpsSignal: Send + Sync {
    fn abandonment_spike(&self, reclaimed: usize, threshold: usize);
}

/// Default sink: a structured warning in the service log.
pub struct LogSignal;

impl OpsSignal for LogSignal {
    fn abandonment_spike(&self, reclaimed: usize, threshold: usize) {
        warn!(
            reclaimed,
            threshold, "seat lock abandonment spike: reclaimed locks exceeded threshold"
        );
    }
}
