use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::logging::log_cache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
enum Outcome<T> {
    Ready(T),
    /// Rendered error of a failed refresh.
    Failed(String),
}

/// Cached outcome with the key it was computed for.
#[derive(Debug, Clone)]
struct Cached<T> {
    key: String,
    outcome: Outcome<T>,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(key: &str, outcome: Outcome<T>) -> Self {
        Self {
            key: key.to_string(),
            outcome,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, key: &str, ttl: Duration, failure_ttl: Duration) -> bool {
        let limit = match self.outcome {
            Outcome::Ready(_) => ttl,
            Outcome::Failed(_) => failure_ttl,
        };
        self.key == key && self.fetched_at.elapsed() < limit
    }
}

/// Single-slot cache with a time-to-live.
///
/// A lookup with a different key or after the TTL runs the refresh. The slot
/// lock is held across the refresh so concurrent callers wait for one load.
/// A failed refresh is remembered for `failure_ttl` (zero by default, which
/// leaves the previous entry untouched).
pub struct TtlCache<T> {
    name: &'static str,
    ttl: Duration,
    failure_ttl: Duration,
    slot: Mutex<Option<Cached<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            failure_ttl: Duration::ZERO,
            slot: Mutex::new(None),
        }
    }

    pub fn with_failure_ttl(mut self, failure_ttl: Duration) -> Self {
        self.failure_ttl = failure_ttl;
        self
    }

    pub async fn get_or_refresh<F, Fut>(&self, key: &str, refresh: F) -> Result<(T, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(key, self.ttl, self.failure_ttl) {
                log_cache(self.name, key, true);
                return match &cached.outcome {
                    Outcome::Ready(data) => Ok((data.clone(), CacheStatus::Hit)),
                    Outcome::Failed(msg) => Err(anyhow!("{} (cached failure)", msg)),
                };
            }
        }

        log_cache(self.name, key, false);
        match refresh().await {
            Ok(data) => {
                *slot = Some(Cached::new(key, Outcome::Ready(data.clone())));
                Ok((data, CacheStatus::Miss))
            }
            Err(err) => {
                if !self.failure_ttl.is_zero() {
                    *slot = Some(Cached::new(key, Outcome::Failed(format!("{:#}", err))));
                }
                Err(err)
            }
        }
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn fresh_entry_is_reused() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let (v, _) = cache
                .get_or_refresh("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                })
                .await
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn new_key_forces_refresh() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let (_, s1) = cache.get_or_refresh("2024-01-01", || async { Ok(1) }).await.unwrap();
        let (v, s2) = cache.get_or_refresh("2024-01-02", || async { Ok(2) }).await.unwrap();
        assert_eq!(s1, CacheStatus::Miss);
        assert_eq!(s2, CacheStatus::Miss);
        assert_eq!(v, 2);
    }

    #[tokio::test]
    async fn expired_entry_is_refreshed() {
        let cache = TtlCache::new("test", Duration::ZERO);
        cache.get_or_refresh("k", || async { Ok(1) }).await.unwrap();
        let (v, status) = cache.get_or_refresh("k", || async { Ok(2) }).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(v, 2);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        let err = cache.get_or_refresh("k", || async { Err(anyhow!("down")) }).await;
        assert!(err.is_err());
        let (v, status) = cache.get_or_refresh("k", || async { Ok(5) }).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(v, 5);
    }

    #[tokio::test]
    async fn failure_is_held_for_failure_ttl() {
        let cache: TtlCache<u32> =
            TtlCache::new("test", Duration::from_secs(60)).with_failure_ttl(Duration::from_secs(60));
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let res = cache
                .get_or_refresh("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow!("upstream 403"))
                })
                .await;
            let err = res.unwrap_err();
            assert!(format!("{:#}", err).contains("upstream 403"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let (v, status) = cache.get_or_refresh("other", || async { Ok(9) }).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(v, 9);
    }

    #[tokio::test]
    async fn invalidate_clears_slot() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        cache.get_or_refresh("k", || async { Ok(1) }).await.unwrap();
        cache.invalidate().await;
        let (_, status) = cache.get_or_refresh("k", || async { Ok(1) }).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
    }
}
