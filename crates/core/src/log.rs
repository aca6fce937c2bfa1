//! MessageLog trait — the append-only short-term conversation log.
//!
//! The log is time-ordered: every append assigns a unique, strictly
//! increasing timestamp key, so "after T" queries are exact and polling
//! clients holding a cursor never see a record twice.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::StoreError;
use crate::record::{MessageRecord, NewRecord};

/// The core MessageLog trait.
///
/// Implementations: SQLite (durable), in-memory (tests and ephemeral runs).
///
/// Ordering contract: `append` serializes timestamp assignment so that
/// concurrent appends never produce equal or out-of-order keys. All query
/// methods return records oldest first.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Assign the ordering timestamp, write durably, return the stored record.
    async fn append(&self, record: NewRecord) -> std::result::Result<MessageRecord, StoreError>;

    /// All records with key strictly greater than `ts`, oldest first.
    async fn since(
        &self,
        ts: DateTime<Utc>,
    ) -> std::result::Result<Vec<MessageRecord>, StoreError>;

    /// All records with key in `[start, end]` inclusive, oldest first.
    async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<MessageRecord>, StoreError>;

    /// All records with key in `[now - window, now]`, oldest first.
    async fn recent(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> std::result::Result<Vec<MessageRecord>, StoreError> {
        self.range(now - window, now).await
    }

    /// The most recent `limit` records, re-ordered oldest first.
    async fn last(&self, limit: usize) -> std::result::Result<Vec<MessageRecord>, StoreError>;

    /// Total number of records in the log.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}
