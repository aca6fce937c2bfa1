//! Webhook body summarization.
//!
//! Turns a structured webhook body into a one-line human-readable string
//! before it enters the chat/context path. Deterministic, synchronous, and
//! total: malformed input falls back to a fixed placeholder instead of
//! failing.

use serde_json::Value;

/// Returned when nothing readable can be extracted from a body.
pub const PLACEHOLDER: &str = "(webhook payload with no readable fields)";

/// Cap on rendered values so one huge field can't flood the line.
const MAX_VALUE_LEN: usize = 48;

/// Cap on rendered keys for generic bodies.
const MAX_KEYS: usize = 8;

/// Summarize a webhook body into a single readable line.
///
/// Known kinds get a templated description; anything else gets a
/// best-effort rendering of the body's top-level keys. Never returns an
/// empty string.
pub fn summarize(name: &str, body: &Value) -> String {
    let line = match name {
        "uptime-kuma" => monitor_line(name, body),
        _ => generic_line(body),
    };

    if line.trim().is_empty() {
        PLACEHOLDER.to_string()
    } else {
        line
    }
}

/// Whether this webhook kind belongs to the monitoring channel.
pub fn is_monitoring_kind(name: &str) -> bool {
    name == "uptime-kuma"
}

/// Templated line for monitor alerts: status, target name, message.
///
/// Field names vary between webhook versions, so each part has a fallback
/// key (`monitor_name`/`name`, `status`/`event`, `msg`/`message`,
/// `monitor_url`/`url`).
fn monitor_line(name: &str, body: &Value) -> String {
    let monitor = str_field(body, &["monitor_name", "name"]).unwrap_or("unknown monitor");
    let status = field(body, &["status", "event"])
        .map(render_value)
        .unwrap_or_else(|| "unknown".into())
        .to_uppercase();

    let mut parts = vec![format!("[{name}] {monitor} is {status}")];
    if let Some(url) = str_field(body, &["monitor_url", "url"]) {
        parts.push(format!("URL: {url}"));
    }
    if let Some(msg) = str_field(body, &["msg", "message"]) {
        parts.push(format!("Message: {msg}"));
    }
    parts.join(" | ")
}

/// Best-effort line for an unrecognized body: top-level keys as key=value.
fn generic_line(body: &Value) -> String {
    match body {
        Value::Object(map) => {
            if map.is_empty() {
                return PLACEHOLDER.to_string();
            }
            let mut parts: Vec<String> = map
                .iter()
                .take(MAX_KEYS)
                .map(|(k, v)| format!("{k}={}", render_value(v)))
                .collect();
            if map.len() > MAX_KEYS {
                parts.push(format!("(+{} more)", map.len() - MAX_KEYS));
            }
            parts.join(" ")
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                PLACEHOLDER.to_string()
            } else {
                truncate(s)
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => format!("array with {} items", items.len()),
        Value::Null => PLACEHOLDER.to_string(),
    }
}

fn field<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| body.get(k))
        .filter(|v| !v.is_null())
}

fn str_field<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a str> {
    field(body, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => truncate(s.trim()),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".into(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(_) => "{..}".into(),
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_VALUE_LEN {
        s.to_string()
    } else {
        let cut: String = s.chars().take(MAX_VALUE_LEN).collect();
        format!("{cut}…")
    }
}
