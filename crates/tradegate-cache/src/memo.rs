use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Short-lived single-flight memo cache backed by moka.
///
/// At most one computation runs per key: concurrent callers for a key that is
/// being computed await the in-flight result instead of recomputing. Failed
/// computations are not stored.
pub struct MemoCache<V> {
    inner: Cache<String, V>,
}

impl<V> MemoCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached value for `key`, or run `init` to produce it.
    pub async fn get_or_try_compute<F, E>(&self, key: String, init: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.inner.try_get_with(key, init).await
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Incremental BLAKE3 content key for memo entries.
///
/// Floats are hashed by their little-endian bytes, so keys are exact: two
/// series differing in any sample never share an entry.
pub struct Fingerprint {
    hasher: blake3::Hasher,
}

impl Fingerprint {
    pub fn new(namespace: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(namespace.as_bytes());
        Self { hasher }
    }

    pub fn str(mut self, value: &str) -> Self {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn usize(mut self, value: usize) -> Self {
        self.hasher.update(&(value as u64).to_le_bytes());
        self
    }

    pub fn f64(mut self, value: f64) -> Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    pub fn f64s(mut self, values: &[f64]) -> Self {
        self.hasher.update(&(values.len() as u64).to_le_bytes());
        for value in values {
            self.hasher.update(&value.to_le_bytes());
        }
        self
    }

    pub fn finish(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn computes_once_and_reuses() {
        let memo: MemoCache<u64> = MemoCache::new(100, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo
                .get_or_try_compute("k".to_string(), async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let memo = Arc::new(MemoCache::<u64>::new(100, Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let memo = Arc::clone(&memo);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                memo.get_or_try_compute("shared".to_string(), async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, String>(7)
                })
                .await
                .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let memo: MemoCache<u64> = MemoCache::new(100, Duration::from_secs(60));

        let first = memo
            .get_or_try_compute("k".to_string(), async { Err::<u64, _>("boom".to_string()) })
            .await;
        assert_eq!(first.unwrap_err().as_str(), "boom");
        assert!(memo.get("k").await.is_none());

        let second = memo
            .get_or_try_compute("k".to_string(), async { Ok::<_, String>(1) })
            .await;
        assert_eq!(second.unwrap(), 1);
    }

    #[tokio::test]
    async fn ttl_expiration() {
        let memo: MemoCache<u64> = MemoCache::new(100, Duration::from_millis(50));
        memo.get_or_try_compute("k".to_string(), async { Ok::<_, String>(1) })
            .await
            .unwrap();
        assert!(memo.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(memo.get("k").await.is_none());
    }

    #[test]
    fn fingerprint_distinguishes_series() {
        let a = Fingerprint::new("rsi").str("BTC").f64s(&[1.0, 2.0]).finish();
        let b = Fingerprint::new("rsi").str("BTC").f64s(&[1.0, 2.5]).finish();
        let c = Fingerprint::new("rsi").str("BTC").f64s(&[1.0, 2.0]).finish();
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn fingerprint_separates_adjacent_strings() {
        let a = Fingerprint::new("x").str("ab").str("c").finish();
        let b = Fingerprint::new("x").str("a").str("bc").finish();
        assert_ne!(a, b);
    }
}
