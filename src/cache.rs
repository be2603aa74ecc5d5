//! Time-bounded in-memory cache.
//!
//! [`TtlCache`] holds one value and the instant it was stored. Reads within the TTL
//! are served from memory. A refresh in flight is guarded so that concurrent callers
//! get the current (possibly stale or empty) value instead of starting a second
//! fetch against the database.
//!
//! Every [`TtlCache::invalidate`] bumps a generation counter. A refresh that started
//! before the invalidation still returns its value to its caller but does not store
//! it, so a write that happened during the load is never masked for a full TTL.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;

/// Default freshness window.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by `tokio::time::Instant`, which follows paused test time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Single-value cache with a TTL and a re-entrancy guard.
pub struct TtlCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<(T, Instant)>>,
    refreshing: AtomicBool,
    generation: AtomicU64,
}

impl<T> std::fmt::Debug for TtlCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Clears the refresh flag even if the loader future is dropped mid-flight.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Clone + Send + Sync> TtlCache<T> {
    /// Empty cache using the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Empty cache using `clock` for expiry.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value if it is still fresh.
    pub async fn get(&self) -> Option<T> {
        let now = self.clock.now();
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|(_, stored)| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(value, _)| value.clone())
    }

    /// The cached value regardless of age.
    pub async fn peek(&self) -> Option<T> {
        self.entry.read().await.as_ref().map(|(value, _)| value.clone())
    }

    /// Stores `value` as fresh.
    pub async fn insert(&self, value: T) {
        let now = self.clock.now();
        *self.entry.write().await = Some((value, now));
    }

    /// Drops the cached value so the next read refetches.
    ///
    /// A refresh already in flight will not store its result.
    pub async fn invalidate(&self) {
        let mut entry = self.entry.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *entry = None;
    }

    /// Stores `value` only if nothing invalidated the cache since `generation` was read.
    async fn insert_if_current(&self, value: T, generation: u64) -> bool {
        let now = self.clock.now();
        let mut entry = self.entry.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        *entry = Some((value, now));
        true
    }

    /// True while a [`TtlCache::get_or_refresh`] loader is running.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// True if there is no fresh value and no refresh running.
    ///
    /// An entry that is locked right now counts as live.
    pub fn is_expired(&self) -> bool {
        if self.is_refreshing() {
            return false;
        }
        let Ok(entry) = self.entry.try_read() else {
            return false;
        };
        let now = self.clock.now();
        entry
            .as_ref()
            .is_none_or(|(_, stored)| now.saturating_duration_since(*stored) >= self.ttl)
    }

    /// Returns the fresh value, or runs `loader` to replace an expired one.
    ///
    /// While another caller's loader is running this returns the current entry
    /// (`None` if the cache was never filled) without calling `loader`.
    pub async fn get_or_refresh<F, Fut, E>(&self, loader: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get().await {
            trace!("Cache hit");
            return Ok(Some(value));
        }

        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Refresh already in flight, serving current entry");
            return Ok(self.peek().await);
        }
        let _guard = RefreshGuard(&self.refreshing);

        let generation = self.generation.load(Ordering::Acquire);
        let value = loader().await?;
        if !self.insert_if_current(value.clone(), generation).await {
            trace!("Cache invalidated during refresh, not storing result");
        }
        Ok(Some(value))
    }
}
