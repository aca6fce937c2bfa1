//! Payload normalization.
//!
//! Converts an arbitrary inbound payload into a canonical [`NewRecord`].
//! Pure transform — no I/O, no persistence. Callers surface
//! [`Error::InvalidPayload`] to the client instead of dropping the message
//! silently.

use murmur_core::error::{Error, Result};
use murmur_core::record::NewRecord;
use serde_json::Value;

use crate::webhook;

/// An inbound payload before normalization.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Free-form chat input
    Text(String),
    /// A structured webhook body, identified by route name
    Webhook { name: String, body: Value },
}

impl Payload {
    pub fn webhook(name: impl Into<String>, body: Value) -> Self {
        Self::Webhook {
            name: name.into(),
            body,
        }
    }
}

/// Normalize an inbound payload into a canonical record.
///
/// Chat text is trimmed and becomes a `user` record on the `chat` channel.
/// Webhook bodies are summarized into a readable line and become `event`
/// records with the original body preserved in `raw_payload`; monitoring
/// kinds land on the `monitoring` channel, everything else on a channel
/// named after the webhook.
pub fn normalize(payload: Payload) -> Result<NewRecord> {
    match payload {
        Payload::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(Error::InvalidPayload("message text is empty".into()));
            }
            Ok(NewRecord::user(text, "chat", "chat"))
        }
        Payload::Webhook { name, body } => {
            if body.is_null() {
                return Err(Error::InvalidPayload(format!(
                    "webhook '{name}' sent an empty body"
                )));
            }
            let text = webhook::summarize(&name, &body);
            let channel = if webhook::is_monitoring_kind(&name) {
                "monitoring".to_string()
            } else {
                name.clone()
            };
            Ok(NewRecord::event(
                text,
                format!("webhook:{name}"),
                channel,
                Some(body),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::record::Role;
    use serde_json::json;

    #[test]
    fn chat_text_trimmed() {
        let rec = normalize(Payload::Text("  turn on the lights \n".into())).unwrap();
        assert_eq!(rec.role, Role::User);
        assert_eq!(rec.text, "turn on the lights");
        assert_eq!(rec.source, "chat");
        assert_eq!(rec.channel, "chat");
        assert!(rec.raw_payload.is_none());
    }

    #[test]
    fn empty_text_rejected() {
        let err = normalize(Payload::Text("".into())).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn whitespace_only_text_rejected() {
        let err = normalize(Payload::Text("   \n\t ".into())).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn webhook_becomes_event_record() {
        let body = json!({"monitor_name": "NAS", "status": "down"});
        let rec = normalize(Payload::webhook("uptime-kuma", body.clone())).unwrap();
        assert_eq!(rec.role, Role::Event);
        assert_eq!(rec.source, "webhook:uptime-kuma");
        assert_eq!(rec.channel, "monitoring");
        assert!(rec.text.contains("NAS is DOWN"));
        assert_eq!(rec.raw_payload, Some(body));
    }

    #[test]
    fn generic_webhook_channel_is_its_name() {
        let rec = normalize(Payload::webhook("github", json!({"action": "push"}))).unwrap();
        assert_eq!(rec.channel, "github");
        assert_eq!(rec.source, "webhook:github");
    }

    #[test]
    fn null_webhook_body_rejected() {
        let err = normalize(Payload::webhook("github", Value::Null)).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn unreadable_webhook_body_still_normalizes() {
        // The summarizer falls back to a placeholder, so the record is valid.
        let rec = normalize(Payload::webhook("mystery", json!({}))).unwrap();
        assert!(!rec.text.is_empty());
    }
}
