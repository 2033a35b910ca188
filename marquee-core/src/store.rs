use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::LockEntry;

pub const LOCK_PREFIX: &str = "seat:";
pub const BOOKED_PREFIX: &str = "booked:";

pub fn lock_key(showtime_id: i64, seat_code: &str) -> String {
    format!("seat:{}:{}", showtime_id, seat_code)
}

pub fn booked_key(showtime_id: i64, seat_code: &str) -> String {
    format!("booked:{}:{}", showtime_id, seat_code)
}

pub fn showtime_lock_prefix(showtime_id: i64) -> String {
    format!("seat:{}:", showtime_id)
}

pub fn showtime_booked_prefix(showtime_id: i64) -> String {
    format!("booked:{}:", showtime_id)
}

/// Extracts the seat code from a `seat:{showtime}:{code}` or
/// `booked:{showtime}:{code}` key.
pub fn seat_code_from_key(key: &str) -> Option<&str> {
    key.splitn(3, ':').nth(2)
}

/// Result of the conditional-set primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireReply {
    /// The key was free; a new lock was written.
    Acquired,
    /// The key was already owned by the same holder; its TTL was reset.
    Refreshed,
    /// The key is owned by a different holder.
    Held(LockEntry),
}

/// Shared key-value store with atomic conditional operations and per-key
/// TTL expiry. Injected into the manager so tests run against an in-memory
/// map and production against a networked store.
///
/// Conditional operations are atomic per key; nothing here spans keys.
/// Reads treat entries past their expiry as absent, except `scan_locks`,
/// which reports raw entries so the sweeper can reclaim what native expiry
/// missed.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set the key if it is absent or already owned by `entry.holder_id`.
    async fn try_acquire(
        &self,
        key: &str,
        entry: &LockEntry,
        ttl_seconds: u64,
    ) -> Result<AcquireReply, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<LockEntry>, StoreError>;

    /// Reset the expiry of a lock currently owned by `holder_id`. Never
    /// creates a lock.
    async fn refresh_if_holder(
        &self,
        key: &str,
        holder_id: &str,
        expires_at: i64,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError>;

    /// Delete the key only while `holder_id` owns it.
    async fn remove_if_holder(&self, key: &str, holder_id: &str) -> Result<bool, StoreError>;

    /// Unconditional delete. Reserved for booking-confirmation supersede.
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete the key only if its stored `expires_at` is at or before `now`.
    async fn remove_expired(&self, key: &str, now: i64) -> Result<bool, StoreError>;

    async fn scan_locks(&self, prefix: &str) -> Result<Vec<(String, LockEntry)>, StoreError>;

    /// Booked-seat tombstones. Markers carry no TTL; only the booking
    /// workflow removes them.
    async fn put_marker(&self, key: &str) -> Result<(), StoreError>;

    async fn has_marker(&self, key: &str) -> Result<bool, StoreError>;

    async fn remove_marker(&self, key: &str) -> Result<bool, StoreError>;

    async fn scan_markers(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(lock_key(42, "A1"), "seat:42:A1");
        assert_eq!(booked_key(42, "A1"), "booked:42:A1");
        assert!(lock_key(42, "A1").starts_with(&showtime_lock_prefix(42)));
    }

    #[test]
    fn seat_code_extraction() {
        assert_eq!(seat_code_from_key("seat:42:A1"), Some("A1"));
        // Seat codes keep any embedded colon intact.
        assert_eq!(seat_code_from_key("booked:7:R:12"), Some("R:12"));
        assert_eq!(seat_code_from_key("seat:42"), None);
    }
}
