//! Per-session concurrency control.
//!
//! Ensures only one turn runs per session at a time. A second message
//! arriving while a turn is in-flight queues behind it; once the queue
//! depth configured by `SessionLockConfig::max_waiters` is reached, further
//! arrivals are rejected immediately with "session busy" instead of
//! queuing without bound.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use wd_domain::config::SessionLockConfig;

struct SessionLock {
    sem: Arc<Semaphore>,
    waiters: Arc<AtomicUsize>,
}

/// Manages per-session run locks.
///
/// Each session key maps to a `Semaphore(1)` plus a waiter count. Acquiring
/// the permit ensures exclusive access for one turn at a time; the waiter
/// count is what turns "second caller blocks" into "third caller rejects."
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, SessionLock>>,
    config: SessionLockConfig,
}

impl SessionLockMap {
    pub fn new(config: SessionLockConfig) -> Self {
        Self { locks: Mutex::new(HashMap::new()), config }
    }

    /// Acquire the run lock for a session.
    ///
    /// Returns `Ok(permit)` when the lock is acquired (hold it for the
    /// duration of the turn — it auto-releases on drop).
    ///
    /// Returns `Err(SessionBusy)` immediately if the session is already at
    /// its configured waiter limit, rather than joining the queue.
    pub async fn acquire(&self, session_key: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        let (sem, waiters) = {
            let mut locks = self.locks.lock();
            let entry = locks.entry(session_key.to_owned()).or_insert_with(|| SessionLock {
                sem: Arc::new(Semaphore::new(1)),
                waiters: Arc::new(AtomicUsize::new(0)),
            });
            (entry.sem.clone(), entry.waiters.clone())
        };

        if let Ok(permit) = sem.clone().try_acquire_owned() {
            return Ok(permit);
        }

        if waiters.fetch_add(1, Ordering::AcqRel) >= self.config.max_waiters {
            waiters.fetch_sub(1, Ordering::AcqRel);
            return Err(SessionBusy);
        }

        let result = sem.acquire_owned().await.map_err(|_| SessionBusy);
        waiters.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// Number of tracked sessions (for monitoring).
    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Remove locks for sessions that aren't actively held (cleanup).
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, lock| lock.sem.available_permits() == 0);
    }
}

/// Error returned when a session is busy (turn in progress, queue full).
#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is busy — a turn is already in progress")
    }
}

impl std::error::Error for SessionBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> SessionLockMap {
        SessionLockMap::new(SessionLockConfig::default())
    }

    #[tokio::test]
    async fn sequential_access() {
        let map = map();

        let permit1 = map.acquire("s1").await.unwrap();
        drop(permit1);

        let permit2 = map.acquire("s1").await.unwrap();
        drop(permit2);
    }

    #[tokio::test]
    async fn different_sessions_concurrent() {
        let map = Arc::new(map());

        let p1 = map.acquire("s1").await.unwrap();
        let p2 = map.acquire("s2").await.unwrap();

        // Both acquired simultaneously.
        assert_eq!(map.session_count(), 2);

        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_session_waits() {
        let map = Arc::new(map());
        let map2 = map.clone();

        let p1 = map.acquire("s1").await.unwrap();

        // Spawn a task that waits for the lock.
        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("s1").await.unwrap();
            42
        });

        // Give the waiter a moment to queue.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // Release the first permit.
        drop(p1);

        // The waiter should now proceed.
        let result = handle.await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn exceeding_max_waiters_rejects_immediately() {
        let map = Arc::new(SessionLockMap::new(SessionLockConfig { max_waiters: 1 }));
        let map2 = map.clone();
        let map3 = map.clone();

        let p1 = map.acquire("s1").await.unwrap();

        let handle = tokio::spawn(async move { map2.acquire("s1").await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // A third caller arrives while one waiter is already queued.
        let rejected = map3.acquire("s1").await;
        assert!(rejected.is_err());

        drop(p1);
        let queued = handle.await.unwrap();
        assert!(queued.is_ok());
    }

    #[tokio::test]
    async fn zero_max_waiters_rejects_any_busy_caller() {
        let map = Arc::new(SessionLockMap::new(SessionLockConfig { max_waiters: 0 }));
        let map2 = map.clone();

        let _p1 = map.acquire("s1").await.unwrap();
        let rejected = map2.acquire("s1").await;
        assert!(rejected.is_err());
    }
}
