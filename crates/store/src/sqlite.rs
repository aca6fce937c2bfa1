//! SQLite backend for the message log and summary store.
//!
//! One database file, two tables:
//! - `messages` — the append-only short-term log
//! - `summaries` — the medium-term condensed store
//!
//! The `ts` column holds fixed-width RFC 3339 micros, so `ORDER BY ts` and
//! range comparisons follow key order without any parsing on the SQL side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use murmur_core::error::StoreError;
use murmur_core::log::MessageLog;
use murmur_core::record::{MessageRecord, NewRecord, Role};
use murmur_core::summary::{NewSummary, SummaryRecord, SummaryStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{encode_ts, next_key};

/// A durable SQLite store implementing both `MessageLog` and `SummaryStore`.
pub struct SqliteStore {
    pool: SqlitePool,
    /// Last issued ordering key, in microseconds since the epoch.
    ///
    /// Held across the INSERT so a reader can never observe a later key
    /// before an earlier one has landed.
    last_key: Mutex<i64>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection; cap the pool at one
        // so every query sees the same data.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            last_key: Mutex::new(0),
        };
        store.run_migrations().await?;
        store.restore_last_key().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations — creates both tables and their indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT UNIQUE NOT NULL,
                ts          TEXT UNIQUE NOT NULL,
                role        TEXT NOT NULL,
                source      TEXT NOT NULL,
                channel     TEXT NOT NULL DEFAULT '',
                text        TEXT NOT NULL,
                raw_payload TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages(ts)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("messages ts index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summaries (
                iid     INTEGER PRIMARY KEY AUTOINCREMENT,
                id      TEXT UNIQUE NOT NULL,
                ts      TEXT NOT NULL,
                text    TEXT NOT NULL,
                span    TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("summaries table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_summaries_ts ON summaries(ts DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("summaries ts index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Seed the key allocator from the stored maximum, so keys keep
    /// increasing across restarts.
    async fn restore_last_key(&self) -> Result<(), StoreError> {
        let row = sqlx::query("SELECT MAX(ts) AS max_ts FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("MAX(ts): {e}")))?;

        let max_ts: Option<String> = row
            .try_get("max_ts")
            .map_err(|e| StoreError::QueryFailed(format!("max_ts column: {e}")))?;

        if let Some(max_ts) = max_ts {
            let parsed = DateTime::parse_from_rfc3339(&max_ts)
                .map_err(|e| StoreError::Storage(format!("Stored ts unparseable: {e}")))?;
            *self.last_key.lock().await = parsed.timestamp_micros();
        }
        Ok(())
    }

    /// Parse a `MessageRecord` from a SQLite row.
    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let ts_str: String = row
            .try_get("ts")
            .map_err(|e| StoreError::QueryFailed(format!("ts column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let source: String = row
            .try_get("source")
            .map_err(|e| StoreError::QueryFailed(format!("source column: {e}")))?;
        let channel: String = row
            .try_get("channel")
            .map_err(|e| StoreError::QueryFailed(format!("channel column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
        let raw_payload_str: Option<String> = row
            .try_get("raw_payload")
            .map_err(|e| StoreError::QueryFailed(format!("raw_payload column: {e}")))?;

        let ts = DateTime::parse_from_rfc3339(&ts_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("ts parse: {e}")))?;

        let role = Role::from_str(&role_str)
            .map_err(|e| StoreError::QueryFailed(format!("role parse: {e}")))?;

        let raw_payload = raw_payload_str.and_then(|s| serde_json::from_str(&s).ok());

        Ok(MessageRecord {
            id,
            ts,
            role,
            source,
            channel,
            text,
            raw_payload,
        })
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<SummaryRecord, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let ts_str: String = row
            .try_get("ts")
            .map_err(|e| StoreError::QueryFailed(format!("ts column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
        let span: Option<String> = row
            .try_get("span")
            .map_err(|e| StoreError::QueryFailed(format!("span column: {e}")))?;

        let ts = DateTime::parse_from_rfc3339(&ts_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("ts parse: {e}")))?;

        Ok(SummaryRecord { id, ts, text, span })
    }

    async fn fetch_records(
        &self,
        sql: &str,
        binds: &[String],
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(bind.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("messages query: {e}")))?;
        rows.iter().map(Self::row_to_record).collect()
    }
}

#[async_trait]
impl MessageLog for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, record: NewRecord) -> Result<MessageRecord, StoreError> {
        let raw_payload = match &record.raw_payload {
            Some(value) => Some(
                serde_json::to_string(value)
                    .map_err(|e| StoreError::Storage(format!("raw_payload serialization: {e}")))?,
            ),
            None => None,
        };

        // Serialize key assignment and the write together: the lock spans
        // the INSERT, so keys are unique, strictly increasing, and land in
        // key order.
        let mut last_key = self.last_key.lock().await;
        let ts = next_key(&mut *last_key)
            .ok_or_else(|| StoreError::Storage("ordering key out of range".into()))?;
        let stored = record.into_record(ts);

        sqlx::query(
            r#"
            INSERT INTO messages (id, ts, role, source, channel, text, raw_payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&stored.id)
        .bind(encode_ts(&stored.ts))
        .bind(stored.role.to_string())
        .bind(&stored.source)
        .bind(&stored.channel)
        .bind(&stored.text)
        .bind(raw_payload.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;
        drop(last_key);

        debug!(id = %stored.id, role = %stored.role, "Appended message record");
        Ok(stored)
    }

    async fn since(&self, ts: DateTime<Utc>) -> Result<Vec<MessageRecord>, StoreError> {
        self.fetch_records(
            "SELECT * FROM messages WHERE ts > ?1 ORDER BY ts ASC",
            &[encode_ts(&ts)],
        )
        .await
    }

    async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        self.fetch_records(
            "SELECT * FROM messages WHERE ts >= ?1 AND ts <= ?2 ORDER BY ts ASC",
            &[encode_ts(&start), encode_ts(&end)],
        )
        .await
    }

    async fn last(&self, limit: usize) -> Result<Vec<MessageRecord>, StoreError> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let rows = sqlx::query("SELECT * FROM messages ORDER BY ts DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("last query: {e}")))?;

        let mut records: Vec<MessageRecord> = rows
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<_, _>>()?;
        records.reverse();
        Ok(records)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;
        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt as usize)
    }
}

#[async_trait]
impl SummaryStore for SqliteStore {
    async fn latest(&self, limit: usize) -> Result<Vec<SummaryRecord>, StoreError> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let rows = sqlx::query("SELECT * FROM summaries ORDER BY ts DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("summaries query: {e}")))?;
        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn put(&self, summary: NewSummary) -> Result<SummaryRecord, StoreError> {
        let stored = summary.into_record();
        sqlx::query("INSERT INTO summaries (id, ts, text, span) VALUES (?1, ?2, ?3, ?4)")
            .bind(&stored.id)
            .bind(encode_ts(&stored.ts))
            .bind(&stored.text)
            .bind(stored.span.as_deref())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("summary INSERT failed: {e}")))?;
        Ok(stored)
    }
}
