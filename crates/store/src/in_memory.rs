//! In-memory backend — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use murmur_core::error::StoreError;
use murmur_core::log::MessageLog;
use murmur_core::record::{MessageRecord, NewRecord};
use murmur_core::summary::{NewSummary, SummaryRecord, SummaryStore};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::next_key;

/// A store that keeps everything in Vecs. Same ordering guarantees as the
/// SQLite backend, no persistence.
pub struct InMemoryStore {
    records: Arc<RwLock<Vec<MessageRecord>>>,
    summaries: Arc<RwLock<Vec<SummaryRecord>>>,
    last_key: std::sync::Mutex<i64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            summaries: Arc::new(RwLock::new(Vec::new())),
            last_key: std::sync::Mutex::new(0),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageLog for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, record: NewRecord) -> Result<MessageRecord, StoreError> {
        // The write lock spans key allocation and the push, so records land
        // in key order.
        let mut records = self.records.write().await;
        let ts = {
            let mut last_key = self.last_key.lock().unwrap_or_else(|e| e.into_inner());
            next_key(&mut last_key)
                .ok_or_else(|| StoreError::Storage("ordering key out of range".into()))?
        };
        let stored = record.into_record(ts);
        records.push(stored.clone());
        Ok(stored)
    }

    async fn since(&self, ts: DateTime<Utc>) -> Result<Vec<MessageRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.ts > ts).cloned().collect())
    }

    async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.ts >= start && r.ts <= end)
            .cloned()
            .collect())
    }

    async fn last(&self, limit: usize) -> Result<Vec<MessageRecord>, StoreError> {
        let records = self.records.read().await;
        let skip = records.len().saturating_sub(limit);
        Ok(records[skip..].to_vec())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}

#[async_trait]
impl SummaryStore for InMemoryStore {
    async fn latest(&self, limit: usize) -> Result<Vec<SummaryRecord>, StoreError> {
        let summaries = self.summaries.read().await;
        let mut sorted: Vec<SummaryRecord> = summaries.clone();
        sorted.sort_by_key(|s| std::cmp::Reverse(s.ts));
        sorted.truncate(limit);
        Ok(sorted)
    }

    async fn put(&self, summary: NewSummary) -> Result<SummaryRecord, StoreError> {
        let stored = summary.into_record();
        self.summaries.write().await.push(stored.clone());
        Ok(stored)
    }
}
