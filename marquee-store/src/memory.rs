use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use marquee_core::error::StoreError;
use marquee_core::model::LockEntry;
use marquee_core::store::{AcquireReply, LockStore};

/// In-memory lock store for tests and single-process development runs.
///
/// Expiry is enforced lazily on reads and conditional writes, mirroring the
/// networked store's native TTL. `scan_locks` deliberately reports entries
/// past their expiry so the sweeper has something to reconcile.
#[derive(Default)]
pub struct MemoryLockStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    locks: HashMap<String, LockEntry>,
    markers: HashSet<String>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> Result<T, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))?;
        Ok(f(&mut inner))
    }
}

fn live_entry<'a>(locks: &'a HashMap<String, LockEntry>, key: &str, now: i64) -> Option<&'a LockEntry> {
    locks.get(key).filter(|e| !e.is_expired_at(now))
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        entry: &LockEntry,
        _ttl_seconds: u64,
    ) -> Result<AcquireReply, StoreError> {
        let now = Utc::now().timestamp();
        self.with_inner(|inner| match live_entry(&inner.locks, key, now) {
            Some(cur) if cur.holder_id != entry.holder_id => AcquireReply::Held(cur.clone()),
            Some(_) => {
                inner.locks.insert(key.to_string(), entry.clone());
                AcquireReply::Refreshed
            }
            None => {
                inner.locks.insert(key.to_string(), entry.clone());
                AcquireReply::Acquired
            }
        })
    }

    async fn get(&self, key: &str) -> Result<Option<LockEntry>, StoreError> {
        let now = Utc::now().timestamp();
        self.with_inner(|inner| live_entry(&inner.locks, key, now).cloned())
    }

    async fn refresh_if_holder(
        &self,
        key: &str,
        holder_id: &str,
        expires_at: i64,
        _ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp();
        self.with_inner(|inner| {
            match inner.locks.get_mut(key) {
                Some(cur) if !cur.is_expired_at(now) && cur.holder_id == holder_id => {
                    cur.expires_at = expires_at;
                    true
                }
                _ => false,
            }
        })
    }

    async fn remove_if_holder(&self, key: &str, holder_id: &str) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp();
        self.with_inner(|inner| {
            let owned = matches!(
                live_entry(&inner.locks, key, now),
                Some(cur) if cur.holder_id == holder_id
            );
            if owned {
                inner.locks.remove(key);
            }
            owned
        })
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.with_inner(|inner| inner.locks.remove(key).is_some())
    }

    async fn remove_expired(&self, key: &str, now: i64) -> Result<bool, StoreError> {
        self.with_inner(|inner| {
            let expired = matches!(inner.locks.get(key), Some(cur) if cur.is_expired_at(now));
            if expired {
                inner.locks.remove(key);
            }
            expired
        })
    }

    async fn scan_locks(&self, prefix: &str) -> Result<Vec<(String, LockEntry)>, StoreError> {
        self.with_inner(|inner| {
            inner
                .locks
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    async fn put_marker(&self, key: &str) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner.markers.insert(key.to_string());
        })
    }

    async fn has_marker(&self, key: &str) -> Result<bool, StoreError> {
        self.with_inner(|inner| inner.markers.contains(key))
    }

    async fn remove_marker(&self, key: &str) -> Result<bool, StoreError> {
        self.with_inner(|inner| inner.markers.remove(key))
    }

    async fn scan_markers(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.with_inner(|inner| {
            inner
                .markers
                .iter()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect()
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
