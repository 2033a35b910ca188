pub mod contract;
pub mod metrics;
pub mod service;
pub mod signal;
pub mod sweeper;

pub use metrics::Metrics;
pub use service::SeatLockService;
pub use signal::{LogSignal, OpsSignal};
pub use sweeper::{Sweeper, SweeperHandle};
