//! Context assembly — builds the bounded window sent with each model call.
//!
//! Two layers, concatenated in chronological order:
//!
//! 1. **Summaries** — up to `summary_limit` most recent entries from the
//!    medium-term store, re-ordered oldest first. Cheap long-range memory.
//! 2. **Recent log** — every raw record inside `recent_window`, oldest
//!    first. Verbatim short-term continuity.
//!
//! The split keeps the prompt bounded regardless of traffic volume: the
//! summary layer is capped by count, the raw layer by time.
//!
//! Assembly is read-only and deterministic for a fixed store state and
//! instant — no wall-clock reads happen here; callers pass `now`.

use chrono::{DateTime, Duration, Utc};
use murmur_core::backend::{ChatTurn, TurnRole};
use murmur_core::error::StoreError;
use murmur_core::log::MessageLog;
use murmur_core::record::{MessageRecord, Role};
use murmur_core::summary::SummaryStore;
use std::sync::Arc;

/// Knobs for the context window.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    /// How far back the raw log layer reaches.
    pub recent_window: Duration,
    /// Cap on the number of summaries included.
    pub summary_limit: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            recent_window: Duration::minutes(15),
            summary_limit: 30,
        }
    }
}

/// One entry of assembled context, ready to become a prompt turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub role: TurnRole,
    pub text: String,
}

impl From<ContextEntry> for ChatTurn {
    fn from(entry: ContextEntry) -> Self {
        ChatTurn {
            role: entry.role,
            content: entry.text,
        }
    }
}

/// The context assembler. Stateless between calls — create one and reuse it.
pub struct ContextAssembler {
    log: Arc<dyn MessageLog>,
    summaries: Arc<dyn SummaryStore>,
    settings: ContextSettings,
}

impl ContextAssembler {
    pub fn new(
        log: Arc<dyn MessageLog>,
        summaries: Arc<dyn SummaryStore>,
        settings: ContextSettings,
    ) -> Self {
        Self {
            log,
            summaries,
            settings,
        }
    }

    /// Assemble the context window at `now`.
    ///
    /// The raw layer covers `[now - recent_window, now]` inclusive. Empty
    /// stores produce an empty window, not an error.
    pub async fn build(&self, now: DateTime<Utc>) -> Result<Vec<ContextEntry>, StoreError> {
        self.assemble(now - self.settings.recent_window, now).await
    }

    /// Assemble the context window ending strictly before `cutoff`.
    ///
    /// Used by the pipeline after the inbound record has been persisted:
    /// the record at `cutoff` itself is excluded, because it is re-sent as
    /// the explicit final turn of the prompt. Relies on ordering keys
    /// having microsecond resolution.
    pub async fn build_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ContextEntry>, StoreError> {
        self.assemble(
            cutoff - self.settings.recent_window,
            cutoff - Duration::microseconds(1),
        )
        .await
    }

    async fn assemble(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContextEntry>, StoreError> {
        let mut entries = Vec::new();

        let mut summaries = self.summaries.latest(self.settings.summary_limit).await?;
        summaries.reverse(); // newest-first from the store → oldest first in the prompt
        entries.extend(summaries.into_iter().map(|s| ContextEntry {
            role: TurnRole::System,
            text: s.text,
        }));

        if end >= start {
            let records = self.log.range(start, end).await?;
            entries.extend(records.into_iter().map(record_entry));
        }

        Ok(entries)
    }
}

/// Map a log record onto a prompt entry. Events carry operational facts,
/// not dialogue, so they go in as system turns.
fn record_entry(record: MessageRecord) -> ContextEntry {
    let role = match record.role {
        Role::User => TurnRole::User,
        Role::Assistant => TurnRole::Assistant,
        Role::Event => TurnRole::System,
    };
    ContextEntry {
        role,
        text: record.text,
    }
}
