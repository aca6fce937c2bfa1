//! SummaryStore trait — the medium-term condensed store.
//!
//! Summaries are produced by a process outside this pipeline (a nightly
//! condensation job); the context assembler only reads them. The store
//! still exposes `put` as the write path for that external producer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// A condensed slice of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Unique summary ID
    pub id: String,

    /// When the summary was produced; also its ordering key
    pub ts: DateTime<Utc>,

    /// The condensed text
    pub text: String,

    /// Human-readable label for the range covered (e.g. "2026-08-01 .. 2026-08-02")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

/// A summary before the store assigns its ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSummary {
    pub ts: DateTime<Utc>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

impl NewSummary {
    pub fn new(ts: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            ts,
            text: text.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    pub fn into_record(self) -> SummaryRecord {
        SummaryRecord {
            id: Uuid::new_v4().to_string(),
            ts: self.ts,
            text: self.text,
            span: self.span,
        }
    }
}

/// The core SummaryStore trait.
///
/// An empty result from `latest` is normal (no summaries yet), never an
/// error.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Up to `limit` summaries, most recent first.
    async fn latest(&self, limit: usize)
    -> std::result::Result<Vec<SummaryRecord>, StoreError>;

    /// Persist a summary. Used by the external condensation job and tests.
    async fn put(&self, summary: NewSummary)
    -> std::result::Result<SummaryRecord, StoreError>;
}
