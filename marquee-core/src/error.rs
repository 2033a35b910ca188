use thiserror::Error;

use crate::model::SeatConflict;

/// Failures surfaced by a lock store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lock store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt lock entry at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Failures surfaced to the booking workflow.
#[derive(Debug, Error)]
pub enum LockError {
    /// Rejected before any store interaction.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// One or more requested seats are held or booked. Recoverable; the
    /// caller shows alternatives to the user.
    #[error("acquisition conflict on {} seat(s)", .conflicts.len())]
    Conflict { conflicts: Vec<SeatConflict> },

    /// The lock store is unreachable. The booking flow must fail closed.
    #[error("lock store unavailable")]
    StoreUnavailable(#[from] StoreError),
}
