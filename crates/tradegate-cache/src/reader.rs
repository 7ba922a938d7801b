use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::future::Cache;
use tradegate_models::sentiment::SentimentReading;
use tracing::debug;

use crate::error::CacheError;
use crate::sqlite::SentimentStore;

/// Read-through sentiment cache: moka (hot) → SQLite (shared).
///
/// SQLite hits are promoted to the hot cache for `memory_ttl`. Concurrent
/// misses for the same symbol share a single query.
///
/// SQLite access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct SentimentReader {
    memory: Cache<String, Arc<Vec<SentimentReading>>>,
    store: Mutex<SentimentStore>,
}

impl SentimentReader {
    pub fn new(store: SentimentStore, max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(memory_ttl)
                .build(),
            store: Mutex::new(store),
        }
    }

    /// Unexpired readings for a symbol; empty when collectors have nothing.
    pub async fn readings(&self, symbol: &str) -> Result<Arc<Vec<SentimentReading>>, CacheError> {
        self.memory
            .try_get_with(symbol.to_string(), async {
                let store = self
                    .store
                    .lock()
                    .map_err(|e| CacheError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
                let readings = store.readings_for(symbol)?;
                debug!(symbol, count = readings.len(), "Loaded sentiment readings from SQLite");
                Ok::<_, CacheError>(Arc::new(readings))
            })
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    /// Drop the hot entry for a symbol so the next read goes to SQLite.
    pub async fn invalidate(&self, symbol: &str) {
        self.memory.invalidate(symbol).await;
    }
}
