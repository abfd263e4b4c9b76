//! Coordination store: a process-wide KV with atomic set-if-absent + TTL.
//!
//! Hosts the three key families the pipeline depends on:
//! - `lock:{session_id}`; serializes agent execution per session
//! - `buffer-timer:{session_id}`; single buffer timer per TTL window
//! - `learn-lock:{learning_space_id}`; serializes skill mutation per space
//!
//! Expiry is lazy: an entry whose deadline has passed counts as absent and
//! is replaced atomically on the next set attempt. Release is
//! compare-and-delete on the caller's token, so a worker that outlived its
//! TTL cannot delete a successor's lock.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Slot {
    token: u64,
    expires_at: Instant,
}

/// Shared handle; cheap to clone via `Arc` at the call sites.
#[derive(Debug, Default)]
pub struct CoordStore {
    entries: DashMap<String, Slot>,
    counter: std::sync::atomic::AtomicU64,
}

/// Proof of a successful acquisition, needed to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(u64);

impl CoordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic set-if-absent with TTL. Returns a token when the key was
    /// newly set, `None` when a live entry already holds it.
    pub fn set_nx(&self, key: &str, ttl: Duration) -> Option<LockToken> {
        let token = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let now = Instant::now();
        let slot = Slot {
            token,
            expires_at: now + ttl,
        };

        // The dashmap entry API gives per-key atomicity for the whole
        // check-and-replace, including lazy expiry.
        let acquired = match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    occupied.insert(slot);
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(slot);
                true
            }
        };

        if acquired {
            debug!(key, "coord key set");
            Some(LockToken(token))
        } else {
            None
        }
    }

    /// Compare-and-delete: removes the key only while `token` still owns it.
    pub fn release(&self, key: &str, token: LockToken) {
        self.entries
            .remove_if(key, |_, e| e.token == token.0);
    }

    /// Whether a live (unexpired) entry exists. Timers use this for
    /// observability only; correctness comes from `set_nx`.
    pub fn exists(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(e) => e.expires_at > Instant::now(),
            None => false,
        }
    }

    /// Drop expired entries. Correctness never depends on this running;
    /// it just bounds memory on long-idle key sets.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }
}

pub fn session_lock_key(session_id: Uuid) -> String {
    format!("lock:{session_id}")
}

pub fn buffer_timer_key(session_id: Uuid) -> String {
    format!("buffer-timer:{session_id}")
}

pub fn learn_lock_key(learning_space_id: Uuid) -> String {
    format!("learn-lock:{learning_space_id}")
}

/// Set `buffer-timer:{session_id}` if absent. `true` means the caller must
/// spawn the timer coroutine for this TTL window.
pub fn check_buffer_timer_or_set(store: &CoordStore, session_id: Uuid, ttl: Duration) -> bool {
    store.set_nx(&buffer_timer_key(session_id), ttl).is_some()
}

/// Try to take the session lock.
pub fn acquire_session_lock(
    store: &CoordStore,
    session_id: Uuid,
    ttl: Duration,
) -> Option<LockToken> {
    store.set_nx(&session_lock_key(session_id), ttl)
}

pub fn release_session_lock(store: &CoordStore, session_id: Uuid, token: LockToken) {
    store.release(&session_lock_key(session_id), token);
}

pub fn acquire_learn_lock(
    store: &CoordStore,
    learning_space_id: Uuid,
    ttl: Duration,
) -> Option<LockToken> {
    store.set_nx(&learn_lock_key(learning_space_id), ttl)
}

pub fn release_learn_lock(store: &CoordStore, learning_space_id: Uuid, token: LockToken) {
    store.release(&learn_lock_key(learning_space_id), token);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_nx_is_exclusive_until_released() {
        let store = CoordStore::new();
        let ttl = Duration::from_secs(60);
        let token = store.set_nx("lock:a", ttl).expect("first set wins");
        assert!(store.set_nx("lock:a", ttl).is_none());
        store.release("lock:a", token);
        assert!(store.set_nx("lock:a", ttl).is_some());
    }

    #[test]
    fn expired_entry_counts_as_absent() {
        let store = CoordStore::new();
        store.set_nx("k", Duration::from_millis(0)).unwrap();
        // TTL of zero expires immediately.
        assert!(store.set_nx("k", Duration::from_secs(60)).is_some());
    }

    #[test]
    fn release_with_stale_token_is_a_noop() {
        let store = CoordStore::new();
        let stale = store.set_nx("k", Duration::from_millis(0)).unwrap();
        let live = store.set_nx("k", Duration::from_secs(60)).unwrap();
        // The expired holder must not free the successor's lock.
        store.release("k", stale);
        assert!(store.exists("k"));
        store.release("k", live);
        assert!(!store.exists("k"));
    }

    #[test]
    fn timer_set_once_per_window() {
        let store = CoordStore::new();
        let session = Uuid::new_v4();
        assert!(check_buffer_timer_or_set(&store, session, Duration::from_secs(8)));
        assert!(!check_buffer_timer_or_set(&store, session, Duration::from_secs(8)));
        // Different sessions get their own timers.
        assert!(check_buffer_timer_or_set(&store, Uuid::new_v4(), Duration::from_secs(8)));
    }

    #[test]
    fn purge_drops_only_expired() {
        let store = CoordStore::new();
        store.set_nx("dead", Duration::from_millis(0)).unwrap();
        store.set_nx("live", Duration::from_secs(60)).unwrap();
        store.purge_expired();
        assert!(!store.exists("dead"));
        assert!(store.exists("live"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquire_single_winner() {
        let store = std::sync::Arc::new(CoordStore::new());
        let session = Uuid::new_v4();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                acquire_session_lock(&store, session, Duration::from_secs(60)).is_some()
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
