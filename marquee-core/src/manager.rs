use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{LockError, StoreError};
use crate::model::{
    ConflictReason, ExtendOutcome, LockEntry, LockGrant, LockRules, SeatConflict, SeatState,
};
use crate::store::{self, AcquireReply, LockStore};

/// Transient store errors on the acquire path are retried this many times
/// before surfacing. Release is idempotent and retried more liberally.
const ACQUIRE_RETRIES: u32 = 2;
const RELEASE_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 50;

/// Atomic group acquisition, release, extension and status query of seat
/// locks. The manager is the sole writer of lock keys; correctness rests on
/// the store's per-key conditional-set, so any number of manager instances
/// may share one store.
pub struct LockManager {
    store: Arc<dyn LockStore>,
    rules: LockRules,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, rules: LockRules) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &LockRules {
        &self.rules
    }

    /// All-or-nothing acquisition of `seat_codes` for `holder_id`.
    ///
    /// Seats already owned by the same holder are refreshed, not rejected.
    /// On the first conflict every lock newly written by this call is
    /// rolled back, and the remaining seats are probed read-only so the
    /// caller sees the full conflict set.
    pub async fn acquire(
        &self,
        showtime_id: i64,
        seat_codes: &[String],
        holder_id: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<LockGrant, LockError> {
        let seats = self.validate_seats(seat_codes)?;
        validate_holder(holder_id)?;
        let ttl = self.effective_ttl(ttl_seconds)?;

        let now = Utc::now().timestamp();
        let entry = LockEntry::new(holder_id, now, ttl);
        let mut newly_acquired: Vec<String> = Vec::new();

        match self
            .acquire_each(showtime_id, &seats, &entry, ttl, &mut newly_acquired)
            .await
        {
            Ok(None) => {
                debug!(
                    showtime_id,
                    holder_id,
                    seats = seats.len(),
                    expires_at = entry.expires_at,
                    "seat locks acquired"
                );
                Ok(LockGrant {
                    showtime_id,
                    seat_codes: seats,
                    expires_at: entry.expires_at,
                })
            }
            Ok(Some((idx, first))) => {
                self.rollback(&newly_acquired, holder_id).await?;
                let mut conflicts = vec![first];
                conflicts.extend(
                    self.probe_conflicts(showtime_id, &seats[idx + 1..], holder_id)
                        .await,
                );
                Err(LockError::Conflict { conflicts })
            }
            Err(e) => {
                // Best effort only. Anything left behind carries a TTL and
                // the sweeper reconciles it.
                if let Err(rb) = self.rollback(&newly_acquired, holder_id).await {
                    warn!("rollback after store failure also failed: {}", rb);
                }
                Err(LockError::StoreUnavailable(e))
            }
        }
    }

    /// Best-effort idempotent release. Seats not owned by `holder_id` are
    /// skipped; the returned list holds what was actually deleted.
    pub async fn release(
        &self,
        showtime_id: i64,
        seat_codes: &[String],
        holder_id: &str,
    ) -> Result<Vec<String>, LockError> {
        let seats = self.validate_seats(seat_codes)?;
        validate_holder(holder_id)?;

        let mut released = Vec::new();
        for seat in &seats {
            let key = store::lock_key(showtime_id, seat);
            let removed = self
                .with_retries(RELEASE_RETRIES, || {
                    self.store.remove_if_holder(&key, holder_id)
                })
                .await?;
            if removed {
                released.push(seat.clone());
            }
        }
        debug!(showtime_id, holder_id, released = released.len(), "seat locks released");
        Ok(released)
    }

    /// Resets the expiry of seats still owned by `holder_id`. Seats no
    /// longer owned are reported as lost, never re-acquired.
    pub async fn extend(
        &self,
        showtime_id: i64,
        seat_codes: &[String],
        holder_id: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<ExtendOutcome, LockError> {
        let seats = self.validate_seats(seat_codes)?;
        validate_holder(holder_id)?;
        let ttl = self.effective_ttl(ttl_seconds)?;

        let expires_at = Utc::now().timestamp() + ttl as i64;
        let mut extended = Vec::new();
        let mut lost = Vec::new();
        for seat in &seats {
            let key = store::lock_key(showtime_id, seat);
            let refreshed = self
                .with_retries(ACQUIRE_RETRIES, || {
                    self.store.refresh_if_holder(&key, holder_id, expires_at, ttl)
                })
                .await?;
            if refreshed {
                extended.push(seat.clone());
            } else {
                lost.push(seat.clone());
            }
        }
        if !lost.is_empty() {
            debug!(showtime_id, holder_id, lost = lost.len(), "extend lost seats");
        }
        Ok(ExtendOutcome {
            extended,
            lost,
            expires_at,
        })
    }

    /// Read-only seat map for one showtime, resolved relative to the
    /// requesting holder. Seats absent from the result are available; the
    /// lock service has no knowledge of the auditorium layout.
    pub async fn status(
        &self,
        showtime_id: i64,
        holder_id: &str,
    ) -> Result<BTreeMap<String, SeatState>, LockError> {
        validate_holder(holder_id)?;

        let now = Utc::now().timestamp();
        let mut seats = BTreeMap::new();

        let lock_prefix = store::showtime_lock_prefix(showtime_id);
        let locks = self
            .with_retries(ACQUIRE_RETRIES, || self.store.scan_locks(&lock_prefix))
            .await?;
        for (key, entry) in locks {
            if entry.is_expired_at(now) {
                continue;
            }
            if let Some(code) = store::seat_code_from_key(&key) {
                let state = if entry.holder_id == holder_id {
                    SeatState::LockedBySelf
                } else {
                    SeatState::LockedByOther
                };
                seats.insert(code.to_string(), state);
            }
        }

        let booked_prefix = store::showtime_booked_prefix(showtime_id);
        let markers = self
            .with_retries(ACQUIRE_RETRIES, || self.store.scan_markers(&booked_prefix))
            .await?;
        for key in markers {
            if let Some(code) = store::seat_code_from_key(&key) {
                seats.insert(code.to_string(), SeatState::Unavailable);
            }
        }

        Ok(seats)
    }

    /// Out-of-band notification that seats were durably booked. Writes a
    /// persistent tombstone and supersedes any live lock on the seat.
    pub async fn mark_booked(
        &self,
        showtime_id: i64,
        seat_codes: &[String],
    ) -> Result<Vec<String>, LockError> {
        let seats = self.validate_seats(seat_codes)?;

        let mut updated = Vec::new();
        for seat in &seats {
            let bkey = store::booked_key(showtime_id, seat);
            self.with_retries(RELEASE_RETRIES, || self.store.put_marker(&bkey))
                .await?;
            let key = store::lock_key(showtime_id, seat);
            self.with_retries(RELEASE_RETRIES, || self.store.remove(&key))
                .await?;
            updated.push(seat.clone());
        }
        debug!(showtime_id, seats = updated.len(), "seats marked booked");
        Ok(updated)
    }

    /// Reverse of [`mark_booked`](Self::mark_booked), driven by booking
    /// cancellation. Returns the seats whose tombstone existed.
    pub async fn mark_released(
        &self,
        showtime_id: i64,
        seat_codes: &[String],
    ) -> Result<Vec<String>, LockError> {
        let seats = self.validate_seats(seat_codes)?;

        let mut updated = Vec::new();
        for seat in &seats {
            let bkey = store::booked_key(showtime_id, seat);
            let removed = self
                .with_retries(RELEASE_RETRIES, || self.store.remove_marker(&bkey))
                .await?;
            if removed {
                updated.push(seat.clone());
            }
        }
        Ok(updated)
    }

    async fn acquire_each(
        &self,
        showtime_id: i64,
        seats: &[String],
        entry: &LockEntry,
        ttl: u64,
        newly_acquired: &mut Vec<String>,
    ) -> Result<Option<(usize, SeatConflict)>, StoreError> {
        for (idx, seat) in seats.iter().enumerate() {
            let bkey = store::booked_key(showtime_id, seat);
            let booked = self
                .with_retries(ACQUIRE_RETRIES, || self.store.has_marker(&bkey))
                .await?;
            if booked {
                return Ok(Some((
                    idx,
                    SeatConflict {
                        seat_code: seat.clone(),
                        reason: ConflictReason::Unavailable,
                    },
                )));
            }

            let key = store::lock_key(showtime_id, seat);
            let reply = self
                .with_retries(ACQUIRE_RETRIES, || self.store.try_acquire(&key, entry, ttl))
                .await?;
            match reply {
                AcquireReply::Acquired => newly_acquired.push(key),
                // Already ours from an earlier call; the TTL was reset in
                // place and the seat must survive any rollback below.
                AcquireReply::Refreshed => {}
                AcquireReply::Held(_) => {
                    return Ok(Some((
                        idx,
                        SeatConflict {
                            seat_code: seat.clone(),
                            reason: ConflictReason::HeldByOther,
                        },
                    )));
                }
            }
        }
        Ok(None)
    }

    async fn rollback(&self, keys: &[String], holder_id: &str) -> Result<(), StoreError> {
        for key in keys {
            self.with_retries(RELEASE_RETRIES, || self.store.remove_if_holder(key, holder_id))
                .await?;
        }
        Ok(())
    }

    /// Advisory classification of seats the aborted acquisition never
    /// reached. Single attempt each; a probe failure just omits the seat.
    async fn probe_conflicts(
        &self,
        showtime_id: i64,
        seats: &[String],
        holder_id: &str,
    ) -> Vec<SeatConflict> {
        let now = Utc::now().timestamp();
        let mut found = Vec::new();
        for seat in seats {
            if let Ok(true) = self.store.has_marker(&store::booked_key(showtime_id, seat)).await {
                found.push(SeatConflict {
                    seat_code: seat.clone(),
                    reason: ConflictReason::Unavailable,
                });
                continue;
            }
            if let Ok(Some(existing)) = self.store.get(&store::lock_key(showtime_id, seat)).await {
                if !existing.is_expired_at(now) && existing.holder_id != holder_id {
                    found.push(SeatConflict {
                        seat_code: seat.clone(),
                        reason: ConflictReason::HeldByOther,
                    });
                }
            }
        }
        found
    }

    fn validate_seats(&self, seat_codes: &[String]) -> Result<Vec<String>, LockError> {
        if seat_codes.is_empty() {
            return Err(LockError::InvalidRequest(
                "seat_codes must not be empty".to_string(),
            ));
        }
        let mut seats = BTreeSet::new();
        for code in seat_codes {
            let trimmed = code.trim();
            if trimmed.is_empty() {
                return Err(LockError::InvalidRequest(
                    "seat codes must not be blank".to_string(),
                ));
            }
            seats.insert(trimmed.to_string());
        }
        if seats.len() > self.rules.max_seats_per_request {
            return Err(LockError::InvalidRequest(format!(
                "at most {} seats per request",
                self.rules.max_seats_per_request
            )));
        }
        Ok(seats.into_iter().collect())
    }

    fn effective_ttl(&self, ttl_seconds: Option<u64>) -> Result<u64, LockError> {
        match ttl_seconds {
            Some(0) => Err(LockError::InvalidRequest("ttl must be positive".to_string())),
            Some(ttl) => Ok(ttl),
            None => Ok(self.rules.default_ttl_seconds),
        }
    }

    async fn with_retries<T, F, Fut>(&self, retries: u32, op: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < retries && matches!(e, StoreError::Unavailable(_)) => {
                    attempt += 1;
                    warn!("lock store error, retrying (attempt {}): {}", attempt, e);
                    sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn validate_holder(holder_id: &str) -> Result<(), LockError> {
    if holder_id.trim().is_empty() {
        return Err(LockError::InvalidRequest(
            "holder_id must not be blank".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Minimal store double. No expiry simulation; the in-memory production
    /// store covers TTL semantics in its own crate.
    #[derive(Default)]
    struct TestStore {
        locks: Mutex<HashMap<String, LockEntry>>,
        markers: Mutex<HashSet<String>>,
        calls: AtomicUsize,
        fail_acquire_on: Mutex<HashMap<String, u32>>,
    }

    impl TestStore {
        fn entry(&self, key: &str) -> Option<LockEntry> {
            self.locks.lock().unwrap().get(key).cloned()
        }

        fn seed(&self, key: &str, holder: &str) {
            let now = Utc::now().timestamp();
            self.locks
                .lock()
                .unwrap()
                .insert(key.to_string(), LockEntry::new(holder, now, 900));
        }

        fn fail_acquire(&self, key: &str, times: u32) {
            self.fail_acquire_on
                .lock()
                .unwrap()
                .insert(key.to_string(), times);
        }
    }

    #[async_trait]
    impl LockStore for TestStore {
        async fn try_acquire(
            &self,
            key: &str,
            entry: &LockEntry,
            _ttl_seconds: u64,
        ) -> Result<AcquireReply, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut fails = self.fail_acquire_on.lock().unwrap();
                if let Some(n) = fails.get_mut(key) {
                    if *n > 0 {
                        *n -= 1;
                        return Err(StoreError::Unavailable("injected failure".to_string()));
                    }
                }
            }
            let mut locks = self.locks.lock().unwrap();
            match locks.get(key) {
                Some(cur) if cur.holder_id != entry.holder_id => Ok(AcquireReply::Held(cur.clone())),
                Some(_) => {
                    locks.insert(key.to_string(), entry.clone());
                    Ok(AcquireReply::Refreshed)
                }
                None => {
                    locks.insert(key.to_string(), entry.clone());
                    Ok(AcquireReply::Acquired)
                }
            }
        }

        async fn get(&self, key: &str) -> Result<Option<LockEntry>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.locks.lock().unwrap().get(key).cloned())
        }

        async fn refresh_if_holder(
            &self,
            key: &str,
            holder_id: &str,
            expires_at: i64,
            _ttl_seconds: u64,
        ) -> Result<bool, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut locks = self.locks.lock().unwrap();
            match locks.get_mut(key) {
                Some(cur) if cur.holder_id == holder_id => {
                    cur.expires_at = expires_at;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn remove_if_holder(&self, key: &str, holder_id: &str) -> Result<bool, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut locks = self.locks.lock().unwrap();
            match locks.get(key) {
                Some(cur) if cur.holder_id == holder_id => {
                    locks.remove(key);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn remove(&self, key: &str) -> Result<bool, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.locks.lock().unwrap().remove(key).is_some())
        }

        async fn remove_expired(&self, key: &str, now: i64) -> Result<bool, StoreError> {
            let mut locks = self.locks.lock().unwrap();
            match locks.get(key) {
                Some(cur) if cur.is_expired_at(now) => {
                    locks.remove(key);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn scan_locks(&self, prefix: &str) -> Result<Vec<(String, LockEntry)>, StoreError> {
            Ok(self
                .locks
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        }

        async fn put_marker(&self, key: &str) -> Result<(), StoreError> {
            self.markers.lock().unwrap().insert(key.to_string());
            Ok(())
        }

        async fn has_marker(&self, key: &str) -> Result<bool, StoreError> {
            Ok(self.markers.lock().unwrap().contains(key))
        }

        async fn remove_marker(&self, key: &str) -> Result<bool, StoreError> {
            Ok(self.markers.lock().unwrap().remove(key))
        }

        async fn scan_markers(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            Ok(self
                .markers
                .lock()
                .unwrap()
                .iter()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn manager(store: Arc<TestStore>) -> LockManager {
        LockManager::new(store, LockRules::default())
    }

    fn seats(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn rejects_invalid_requests_before_store_io() {
        let store = Arc::new(TestStore::default());
        let mgr = manager(store.clone());

        let empty: Vec<String> = vec![];
        assert!(matches!(
            mgr.acquire(1, &empty, "h1", None).await,
            Err(LockError::InvalidRequest(_))
        ));
        assert!(matches!(
            mgr.acquire(1, &seats(&["A1"]), "h1", Some(0)).await,
            Err(LockError::InvalidRequest(_))
        ));
        assert!(matches!(
            mgr.acquire(1, &seats(&["A1"]), "  ", None).await,
            Err(LockError::InvalidRequest(_))
        ));
        assert!(matches!(
            mgr.acquire(1, &seats(&[" "]), "h1", None).await,
            Err(LockError::InvalidRequest(_))
        ));
        let too_many: Vec<String> = (0..11).map(|i| format!("A{}", i)).collect();
        assert!(matches!(
            mgr.acquire(1, &too_many, "h1", None).await,
            Err(LockError::InvalidRequest(_))
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn acquires_all_requested_seats() {
        let store = Arc::new(TestStore::default());
        let mgr = manager(store.clone());

        let grant = mgr
            .acquire(7, &seats(&["B2", "A1", "A1"]), "h1", Some(600))
            .await
            .unwrap();
        // Deduplicated and in stable order.
        assert_eq!(grant.seat_codes, seats(&["A1", "B2"]));

        let entry = store.entry("seat:7:A1").unwrap();
        assert_eq!(entry.holder_id, "h1");
        assert_eq!(entry.expires_at, entry.acquired_at + 600);
        assert_eq!(grant.expires_at, entry.expires_at);
    }

    #[tokio::test]
    async fn same_holder_reacquire_is_idempotent_and_refreshes() {
        let store = Arc::new(TestStore::default());
        let mgr = manager(store.clone());

        mgr.acquire(7, &seats(&["A1"]), "h1", Some(60)).await.unwrap();
        let first = store.entry("seat:7:A1").unwrap();

        let grant = mgr.acquire(7, &seats(&["A1"]), "h1", Some(900)).await.unwrap();
        assert_eq!(grant.seat_codes, seats(&["A1"]));

        let second = store.entry("seat:7:A1").unwrap();
        assert_eq!(second.holder_id, "h1");
        assert!(second.expires_at > first.expires_at);
    }

    #[tokio::test]
    async fn conflict_rolls_back_partial_acquisition() {
        let store = Arc::new(TestStore::default());
        store.seed("seat:7:B1", "h2");
        let mgr = manager(store.clone());

        let err = mgr
            .acquire(7, &seats(&["A1", "B1", "C1"]), "h1", None)
            .await
            .unwrap_err();
        match err {
            LockError::Conflict { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].seat_code, "B1");
                assert_eq!(conflicts[0].reason, ConflictReason::HeldByOther);
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        // Nothing left behind for h1, and h2's lock is untouched.
        assert!(store.entry("seat:7:A1").is_none());
        assert!(store.entry("seat:7:C1").is_none());
        assert_eq!(store.entry("seat:7:B1").unwrap().holder_id, "h2");
    }

    #[tokio::test]
    async fn conflict_reports_all_conflicting_seats() {
        let store = Arc::new(TestStore::default());
        store.seed("seat:7:B1", "h2");
        store.seed("seat:7:D1", "h3");
        let mgr = manager(store.clone());

        let err = mgr
            .acquire(7, &seats(&["A1", "B1", "C1", "D1"]), "h1", None)
            .await
            .unwrap_err();
        match err {
            LockError::Conflict { conflicts } => {
                let codes: Vec<&str> = conflicts.iter().map(|c| c.seat_code.as_str()).collect();
                assert_eq!(codes, vec!["B1", "D1"]);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rollback_spares_seats_held_before_the_call() {
        let store = Arc::new(TestStore::default());
        store.seed("seat:7:A1", "h1");
        store.seed("seat:7:B1", "h2");
        let mgr = manager(store.clone());

        let err = mgr.acquire(7, &seats(&["A1", "B1"]), "h1", None).await.unwrap_err();
        assert!(matches!(err, LockError::Conflict { .. }));

        // A1 predates this call and must not be released by its rollback.
        assert_eq!(store.entry("seat:7:A1").unwrap().holder_id, "h1");
    }

    #[tokio::test]
    async fn booked_seats_conflict_as_unavailable() {
        let store = Arc::new(TestStore::default());
        let mgr = manager(store.clone());

        mgr.mark_booked(7, &seats(&["A1"])).await.unwrap();

        let err = mgr.acquire(7, &seats(&["A1"]), "h1", None).await.unwrap_err();
        match err {
            LockError::Conflict { conflicts } => {
                assert_eq!(conflicts[0].reason, ConflictReason::Unavailable);
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        mgr.mark_released(7, &seats(&["A1"])).await.unwrap();
        assert!(mgr.acquire(7, &seats(&["A1"]), "h1", None).await.is_ok());
    }

    #[tokio::test]
    async fn mark_booked_supersedes_live_lock() {
        let store = Arc::new(TestStore::default());
        let mgr = manager(store.clone());

        mgr.acquire(7, &seats(&["A1"]), "h1", None).await.unwrap();
        mgr.mark_booked(7, &seats(&["A1"])).await.unwrap();

        assert!(store.entry("seat:7:A1").is_none());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = Arc::new(TestStore::default());
        let mgr = manager(store.clone());

        mgr.acquire(7, &seats(&["A1"]), "h1", None).await.unwrap();

        let released = mgr.release(7, &seats(&["A1"]), "h1").await.unwrap();
        assert_eq!(released, seats(&["A1"]));

        let released = mgr.release(7, &seats(&["A1"]), "h1").await.unwrap();
        assert!(released.is_empty());
    }

    #[tokio::test]
    async fn release_skips_seats_owned_by_others() {
        let store = Arc::new(TestStore::default());
        store.seed("seat:7:A1", "h2");
        let mgr = manager(store.clone());

        let released = mgr.release(7, &seats(&["A1"]), "h1").await.unwrap();
        assert!(released.is_empty());
        assert_eq!(store.entry("seat:7:A1").unwrap().holder_id, "h2");
    }

    #[tokio::test]
    async fn extend_refreshes_owned_and_reports_lost() {
        let store = Arc::new(TestStore::default());
        store.seed("seat:7:B1", "h2");
        let mgr = manager(store.clone());

        mgr.acquire(7, &seats(&["A1"]), "h1", Some(60)).await.unwrap();
        let before = store.entry("seat:7:A1").unwrap();

        let outcome = mgr
            .extend(7, &seats(&["A1", "B1"]), "h1", Some(900))
            .await
            .unwrap();
        assert_eq!(outcome.extended, seats(&["A1"]));
        assert_eq!(outcome.lost, seats(&["B1"]));

        let after = store.entry("seat:7:A1").unwrap();
        assert!(after.expires_at > before.expires_at);
        // Extend never steals: B1 still belongs to h2.
        assert_eq!(store.entry("seat:7:B1").unwrap().holder_id, "h2");
    }

    #[tokio::test]
    async fn status_resolves_states_per_holder() {
        let store = Arc::new(TestStore::default());
        let mgr = manager(store.clone());

        mgr.acquire(7, &seats(&["A1", "A2"]), "h1", None).await.unwrap();
        mgr.acquire(7, &seats(&["B1"]), "h2", None).await.unwrap();
        mgr.mark_booked(7, &seats(&["C1"])).await.unwrap();
        // A lock for another showtime must not leak into the map.
        mgr.acquire(8, &seats(&["A1"]), "h3", None).await.unwrap();

        let map = mgr.status(7, "h1").await.unwrap();
        assert_eq!(map.get("A1"), Some(&SeatState::LockedBySelf));
        assert_eq!(map.get("A2"), Some(&SeatState::LockedBySelf));
        assert_eq!(map.get("B1"), Some(&SeatState::LockedByOther));
        assert_eq!(map.get("C1"), Some(&SeatState::Unavailable));
        assert_eq!(map.len(), 4);

        let map = mgr.status(7, "h2").await.unwrap();
        assert_eq!(map.get("A1"), Some(&SeatState::LockedByOther));
        assert_eq!(map.get("B1"), Some(&SeatState::LockedBySelf));
    }

    #[tokio::test]
    async fn status_hides_expired_locks() {
        let store = Arc::new(TestStore::default());
        let past = Utc::now().timestamp() - 10;
        store.locks.lock().unwrap().insert(
            "seat:7:A1".to_string(),
            LockEntry {
                holder_id: "h1".to_string(),
                acquired_at: past - 900,
                expires_at: past,
            },
        );
        let mgr = manager(store.clone());

        let map = mgr.status(7, "h2").await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn transient_store_errors_are_retried() {
        let store = Arc::new(TestStore::default());
        store.fail_acquire("seat:7:A1", 2);
        let mgr = manager(store.clone());

        let grant = mgr.acquire(7, &seats(&["A1"]), "h1", None).await.unwrap();
        assert_eq!(grant.seat_codes, seats(&["A1"]));
    }

    #[tokio::test]
    async fn persistent_store_errors_surface_and_roll_back() {
        let store = Arc::new(TestStore::default());
        store.fail_acquire("seat:7:B1", u32::MAX);
        let mgr = manager(store.clone());

        let err = mgr.acquire(7, &seats(&["A1", "B1"]), "h1", None).await.unwrap_err();
        assert!(matches!(err, LockError::StoreUnavailable(_)));

        // The seat acquired before the failure was rolled back.
        assert!(store.entry("seat:7:A1").is_none());
    }
}
