//! HTTP API gateway for Murmur.
//!
//! Exposes the chat endpoint, webhook ingestion, history retrieval, the
//! range browser, and a health check. Built on Axum; each request runs the
//! pipeline start-to-finish, with the store write and the model call as the
//! only await points.

pub mod error;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use murmur_core::log::MessageLog;
use murmur_core::record::{MessageRecord, Role};
use murmur_ingest::Payload;
use murmur_pipeline::{ContextSettings, ReplyConfig, ReplyService};

use error::GatewayError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: ReplyService,
    pub log: Arc<dyn MessageLog>,
}

type SharedState = Arc<GatewayState>;

/// Default page size for `/history` without an `after` cursor.
const HISTORY_PAGE: usize = 50;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/webhook/{name}", post(webhook_handler))
        .route("/history", get(history_handler))
        .route("/data", get(data_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Opens the store, builds the configured backend, and serves until the
/// process is stopped.
pub async fn start(config: murmur_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    if !config.storage.path.contains(":memory:") {
        if let Some(parent) = std::path::Path::new(&config.storage.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = Arc::new(murmur_store::SqliteStore::new(&config.storage.path).await?);
    let backend = murmur_providers::build_from_config(&config)?;

    let service = ReplyService::new(
        store.clone(),
        store.clone(),
        backend,
        ContextSettings {
            recent_window: chrono::Duration::minutes(config.context.recent_window_minutes as i64),
            summary_limit: config.context.summary_limit,
        },
        ReplyConfig {
            model: config.backend.model.clone(),
            temperature: config.backend.temperature,
            max_tokens: config.backend.max_tokens,
            system_prompt: config.system_prompt(),
        },
    );

    let state = Arc::new(GatewayState {
        service,
        log: store,
    });

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ChatRequestBody {
    /// The message text. `message` is accepted as a legacy alias.
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct ReplyResponse {
    reply: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ReplyResponse>, GatewayError> {
    let text = body.text.or(body.message).unwrap_or_default();
    let exchange = state.service.handle(Payload::Text(text)).await?;
    Ok(Json(ReplyResponse {
        reply: exchange.reply.text,
    }))
}

async fn webhook_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ReplyResponse>, GatewayError> {
    info!(webhook = %name, "Webhook received");
    let exchange = state.service.handle(Payload::webhook(name, body)).await?;
    Ok(Json(ReplyResponse {
        reply: exchange.reply.text,
    }))
}

/// Wire shape for history and range results.
#[derive(Serialize)]
struct HistoryItem {
    ts: DateTime<Utc>,
    role: Role,
    source: String,
    text: String,
}

impl From<MessageRecord> for HistoryItem {
    fn from(record: MessageRecord) -> Self {
        Self {
            ts: record.ts,
            role: record.role,
            source: record.source,
            text: record.text,
        }
    }
}

#[derive(Deserialize)]
struct HistoryParams {
    /// ISO 8601 cursor; records strictly after it are returned.
    after: Option<String>,
}

async fn history_handler(
    State(state): State<SharedState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryItem>>, GatewayError> {
    let records = match params.after.as_deref() {
        Some(after) => {
            let since = parse_ts(after, "after")?;
            state.log.since(since).await.map_err(murmur_core::Error::from)?
        }
        None => state
            .log
            .last(HISTORY_PAGE)
            .await
            .map_err(murmur_core::Error::from)?,
    };
    Ok(Json(records.into_iter().map(HistoryItem::from).collect()))
}

#[derive(Deserialize)]
struct RangeParams {
    start: Option<String>,
    end: Option<String>,
}

async fn data_handler(
    State(state): State<SharedState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<HistoryItem>>, GatewayError> {
    let start = params
        .start
        .as_deref()
        .ok_or_else(|| GatewayError::Validation("'start' is required".into()))?;
    let end = params
        .end
        .as_deref()
        .ok_or_else(|| GatewayError::Validation("'end' is required".into()))?;

    let start = parse_ts(start, "start")?;
    let end = parse_ts(end, "end")?;
    if start > end {
        return Err(GatewayError::Validation(
            "'end' must not be before 'start'".into(),
        ));
    }

    let records = state
        .log
        .range(start, end)
        .await
        .map_err(murmur_core::Error::from)?;
    Ok(Json(records.into_iter().map(HistoryItem::from).collect()))
}

/// Parse an ISO 8601 timestamp, with or without an offset.
///
/// Browsers send `...Z`, humans often paste naive timestamps; both are
/// accepted, naive values are taken as UTC.
fn parse_ts(value: &str, field: &str) -> Result<DateTime<Utc>, GatewayError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    Err(GatewayError::Validation(format!(
        "invalid '{field}' timestamp: {value}"
    )))
}
