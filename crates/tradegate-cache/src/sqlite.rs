use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use tradegate_models::sentiment::SentimentReading;

use crate::error::CacheError;

/// Table written by external sentiment collectors and read by tradegate.
///
/// One row per `(symbol, source)`; collectors overwrite their row on refresh.
pub const SENTIMENT_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS sentiment_scores (
    symbol      TEXT NOT NULL,
    source      TEXT NOT NULL,
    score       REAL NOT NULL,
    observed_at TEXT NOT NULL,
    expires_at  TEXT NOT NULL,
    PRIMARY KEY (symbol, source)
);
CREATE INDEX IF NOT EXISTS idx_sentiment_expires ON sentiment_scores(expires_at);
";

/// SQLite accessor for per-symbol sentiment readings.
pub struct SentimentStore {
    conn: Connection,
}

impl SentimentStore {
    /// Open a read-only connection to a shared store.
    pub fn open(path: &str) -> Result<Self, CacheError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open (creating if needed) a writable store with the schema applied.
    /// Collectors and tests use this; the service itself only reads.
    pub fn create(path: &str) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SENTIMENT_TABLE_DDL)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SENTIMENT_TABLE_DDL)?;
        Ok(Self { conn })
    }

    /// All unexpired readings for a symbol, ordered by source name.
    pub fn readings_for(&self, symbol: &str) -> Result<Vec<SentimentReading>, CacheError> {
        let now = Utc::now();
        let mut stmt = self.conn.prepare_cached(
            "SELECT source, score, observed_at FROM sentiment_scores \
             WHERE symbol = ?1 AND expires_at > ?2 ORDER BY source",
        )?;

        let readings = stmt
            .query_map(rusqlite::params![symbol, now], |row| {
                Ok(SentimentReading {
                    source: row.get(0)?,
                    score: row.get(1)?,
                    observed_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    pub fn upsert(
        &self,
        symbol: &str,
        reading: &SentimentReading,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sentiment_scores \
             (symbol, source, score, observed_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                symbol,
                reading.source,
                reading.score,
                reading.observed_at,
                expires_at,
            ],
        )?;
        Ok(())
    }

    /// Delete expired rows. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let removed = self.conn.execute(
            "DELETE FROM sentiment_scores WHERE expires_at <= ?1",
            rusqlite::params![Utc::now()],
        )?;
        Ok(removed)
    }
}
