use serde::{Deserialize, Serialize};

/// Value stored under a lock key in the lock store.
///
/// Timestamps are unix seconds. `expires_at` duplicates the store's native
/// TTL so the sweeper can audit entries whose expiry never fired.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub holder_id: String,
    pub acquired_at: i64,
    pub expires_at: i64,
}

impl LockEntry {
    pub fn new(holder_id: impl Into<String>, acquired_at: i64, ttl_seconds: u64) -> Self {
        Self {
            holder_id: holder_id.into(),
            acquired_at,
            expires_at: acquired_at + ttl_seconds as i64,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Why a seat could not be locked.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// A different holder currently owns the lock.
    HeldByOther,
    /// The seat is booked; only the booking workflow can free it.
    Unavailable,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SeatConflict {
    pub seat_code: String,
    pub reason: ConflictReason,
}

/// Seat visibility relative to the requesting holder.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatState {
    Available,
    LockedBySelf,
    LockedByOther,
    Unavailable,
}

/// Handle returned by a successful group acquisition.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LockGrant {
    pub showtime_id: i64,
    pub seat_codes: Vec<String>,
    pub expires_at: i64,
}

/// Per-seat result of an extend call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExtendOutcome {
    pub extended: Vec<String>,
    pub lost: Vec<String>,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LockRules {
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_request: usize,
}

fn default_ttl_seconds() -> u64 {
    900
}

fn default_max_seats() -> usize {
    10
}

impl Default for LockRules {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl_seconds(),
            max_seats_per_request: default_max_seats(),
        }
    }
}
