//! Message record domain types.
//!
//! These are the value objects that flow through the entire system:
//! a payload arrives → the normalizer produces a [`NewRecord`] → the log
//! assigns the ordering timestamp and persists it as a [`MessageRecord`] →
//! the assembler reads records back to build model context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a record in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (chat input)
    User,
    /// The model's reply
    Assistant,
    /// An external event (webhook)
    Event,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Event => write!(f, "event"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "event" => Ok(Role::Event),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A persisted entry in the message log.
///
/// `ts` is the canonical ordering key: unique per record, strictly
/// increasing in append order, microsecond resolution. Records are never
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique record ID
    pub id: String,

    /// Ordering timestamp, assigned by the log at append time
    pub ts: DateTime<Utc>,

    /// Who produced this record
    pub role: Role,

    /// Origin identifier (`chat`, `webhook:<name>`, backend name for replies)
    pub source: String,

    /// Routing/grouping label; may be empty
    #[serde(default)]
    pub channel: String,

    /// Normalized plain-text body
    pub text: String,

    /// Original payload, kept for audit; never interpreted downstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<serde_json::Value>,
}

/// A record the log has not yet stamped.
///
/// Produced by the normalizer (or by the pipeline for replies); the log's
/// `append` assigns `id` and the ordering timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub role: Role,
    pub source: String,
    #[serde(default)]
    pub channel: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<serde_json::Value>,
}

impl NewRecord {
    /// A user chat message.
    pub fn user(text: impl Into<String>, source: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            source: source.into(),
            channel: channel.into(),
            text: text.into(),
            raw_payload: None,
        }
    }

    /// A model reply.
    pub fn assistant(
        text: impl Into<String>,
        source: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            source: source.into(),
            channel: channel.into(),
            text: text.into(),
            raw_payload: None,
        }
    }

    /// An external event, keeping the original payload for audit.
    pub fn event(
        text: impl Into<String>,
        source: impl Into<String>,
        channel: impl Into<String>,
        raw_payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            role: Role::Event,
            source: source.into(),
            channel: channel.into(),
            text: text.into(),
            raw_payload,
        }
    }

    /// Stamp this record with an ID and ordering timestamp.
    ///
    /// Intended for log implementations; `ts` must come from the log's
    /// monotonic allocator so the ordering invariant holds.
    pub fn into_record(self, ts: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            id: Uuid::new_v4().to_string(),
            ts,
            role: self.role,
            source: self.source,
            channel: self.channel,
            text: self.text,
            raw_payload: self.raw_payload,
        }
    }
}
