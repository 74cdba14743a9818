//! Shared server state: the database handle and the store-call runner.
//!
//! SQLite calls block, so every store call runs on the blocking pool. The
//! single connection sits behind a mutex, which serializes writes.

use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lab_orders_core::{Clock, Database, OrderService, SystemClock};

use crate::error::ApiError;

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// A borrowed view of the store for the duration of one call.
pub struct Store<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
}

impl<'a> Store<'a> {
    /// The order pipeline over this store.
    pub fn orders(&self) -> OrderService<'a, Database> {
        OrderService::with_clock(self.db, self.clock)
    }
}

impl Deref for Store<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl AppState {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        Self::with_clock(db, retry, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, retry: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            clock,
            retry,
        }
    }

    /// Run a store call on the blocking pool.
    ///
    /// Transient failures are retried per the [`RetryPolicy`]; every other
    /// error is returned on the first attempt. A call that panics fails with
    /// [`ApiError::Internal`] and leaves the store usable for later calls.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: Fn(Store<'_>) -> Result<T, ApiError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let op = Arc::new(op);
        let mut attempt = 0;

        loop {
            let db = Arc::clone(&self.db);
            let clock = Arc::clone(&self.clock);
            let call = Arc::clone(&op);

            let result = tokio::task::spawn_blocking(move || {
                let guard = db.lock().unwrap_or_else(|poisoned| {
                    tracing::warn!("database lock poisoned by a panicked store call, recovering");
                    db.clear_poison();
                    PoisonError::into_inner(poisoned)
                });
                let store = Store {
                    db: &guard,
                    clock: clock.as_ref(),
                };
                call(store)
            })
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?;

            match result {
                Err(e) if e.is_transient() && attempt < self.retry.retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    tracing::warn!(attempt, ?delay, error = %e, "transient store failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn state(retries: u32) -> AppState {
        AppState::new(
            Database::open_in_memory().unwrap(),
            RetryPolicy {
                retries,
                backoff: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            retries: 3,
            backoff: Duration::from_millis(50),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(50));
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(RetryPolicy::none().delay(5), Duration::ZERO);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let state = state(2);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = state
            .with_store(move |store| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(ApiError::Transient("database is locked".into()));
                }
                Ok(store.list_patients().map_err(|e| ApiError::Internal(e.to_string()))?.len())
            })
            .await;

        assert_eq!(result.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let state = state(1);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), ApiError> = state
            .with_store(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Transient("database is busy".into()))
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let state = state(3);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), ApiError> = state
            .with_store(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::ReferentialConflict)
            })
            .await;

        assert!(matches!(result, Err(ApiError::ReferentialConflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicked_call_does_not_wedge_the_store() {
        let state = state(0);

        let result: Result<(), ApiError> = state
            .with_store(|_| panic!("attempt to add with overflow"))
            .await;
        assert!(matches!(result, Err(ApiError::Internal(_))));

        for _ in 0..2 {
            let count = state
                .with_store(|store| {
                    store
                        .list_patients()
                        .map(|p| p.len())
                        .map_err(|e| ApiError::Internal(e.to_string()))
                })
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
    }
}
