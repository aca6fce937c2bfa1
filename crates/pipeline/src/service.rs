//! The inbound-to-reply pipeline.
//!
//! Every chat message and webhook goes through the same two operations,
//! kept separate so each can be tested and retried on its own:
//!
//! - [`ReplyService::ingest`] — normalize the payload and append it to the
//!   log. After this the audit trail is complete even if the model call
//!   fails.
//! - [`ReplyService::respond`] — assemble context from before the inbound
//!   record, call the backend, append the reply. The reply is persisted
//!   exactly once per successful call and never on failure.

use murmur_core::backend::{ChatRequest, ChatTurn, CompletionBackend, TurnRole};
use murmur_core::error::Result;
use murmur_core::log::MessageLog;
use murmur_core::record::{MessageRecord, NewRecord, Role};
use murmur_core::summary::SummaryStore;
use murmur_ingest::{Payload, normalize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::{ContextAssembler, ContextSettings};

/// Model-call configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct ReplyConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: String,
}

/// The persisted result of one handled payload.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub inbound: MessageRecord,
    pub reply: MessageRecord,
}

/// The request pipeline behind every chat and webhook call.
pub struct ReplyService {
    log: Arc<dyn MessageLog>,
    assembler: ContextAssembler,
    backend: Arc<dyn CompletionBackend>,
    config: ReplyConfig,
}

impl ReplyService {
    pub fn new(
        log: Arc<dyn MessageLog>,
        summaries: Arc<dyn SummaryStore>,
        backend: Arc<dyn CompletionBackend>,
        context: ContextSettings,
        config: ReplyConfig,
    ) -> Self {
        let assembler = ContextAssembler::new(log.clone(), summaries, context);
        Self {
            log,
            assembler,
            backend,
            config,
        }
    }

    /// Normalize an inbound payload and persist it.
    pub async fn ingest(&self, payload: Payload) -> Result<MessageRecord> {
        let record = normalize(payload)?;
        let stored = self.log.append(record).await?;
        debug!(id = %stored.id, role = %stored.role, source = %stored.source, "Ingested record");
        Ok(stored)
    }

    /// Build context, call the backend, and persist the reply.
    ///
    /// Context is assembled strictly before `inbound.ts`; the inbound text
    /// is then appended as the explicit final turn, so it appears exactly
    /// once in the prompt.
    pub async fn respond(&self, inbound: &MessageRecord) -> Result<MessageRecord> {
        let entries = self.assembler.build_before(inbound.ts).await?;

        let mut turns = Vec::with_capacity(entries.len() + 2);
        if !self.config.system_prompt.is_empty() {
            turns.push(ChatTurn::system(&self.config.system_prompt));
        }
        turns.extend(entries.into_iter().map(ChatTurn::from));
        turns.push(ChatTurn {
            role: inbound_turn_role(inbound.role),
            content: inbound.text.clone(),
        });

        let reply = self
            .backend
            .complete(ChatRequest {
                model: self.config.model.clone(),
                turns,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            })
            .await?;

        let stored = self
            .log
            .append(NewRecord::assistant(
                reply.text,
                self.backend.name(),
                inbound.channel.clone(),
            ))
            .await?;

        info!(
            inbound = %inbound.id,
            reply = %stored.id,
            model = %reply.model,
            "Reply persisted"
        );
        Ok(stored)
    }

    /// Ingest a payload and respond to it — the full request pipeline.
    pub async fn handle(&self, payload: Payload) -> Result<Exchange> {
        let inbound = self.ingest(payload).await?;
        let reply = self.respond(&inbound).await?;
        Ok(Exchange { inbound, reply })
    }
}

/// Events enter the prompt as system turns, like in the assembled history.
fn inbound_turn_role(role: Role) -> TurnRole {
    match role {
        Role::User => TurnRole::User,
        Role::Assistant => TurnRole::Assistant,
        Role::Event => TurnRole::System,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use murmur_core::backend::ChatReply;
    use murmur_core::error::{BackendError, Error};
    use murmur_core::summary::NewSummary;
    use murmur_store::InMemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    /// Scripted backend: records every request, answers from a queue.
    struct MockBackend {
        replies: Mutex<Vec<std::result::Result<String, BackendError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockBackend {
        fn answering(text: &str) -> Self {
            Self {
                replies: Mutex::new(vec![Ok(text.to_string())]),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: BackendError) -> Self {
            Self {
                replies: Mutex::new(vec![Err(err)]),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn last_request(&self) -> ChatRequest {
            self.requests.lock().unwrap().last().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CompletionBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            request: ChatRequest,
        ) -> std::result::Result<ChatReply, BackendError> {
            self.requests.lock().unwrap().push(request);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                panic!("MockBackend: no more scripted replies");
            }
            replies.remove(0).map(|text| ChatReply {
                text,
                model: "mock-model".into(),
                usage: None,
            })
        }
    }

    fn service(store: Arc<InMemoryStore>, backend: Arc<MockBackend>) -> ReplyService {
        ReplyService::new(
            store.clone(),
            store,
            backend,
            ContextSettings::default(),
            ReplyConfig {
                model: "llama3".into(),
                temperature: 0.7,
                max_tokens: None,
                system_prompt: "You are a home assistant.".into(),
            },
        )
    }

    #[tokio::test]
    async fn chat_appends_user_then_assistant() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MockBackend::answering("Lights are on."));
        let svc = service(store.clone(), backend.clone());

        let exchange = svc
            .handle(Payload::Text("turn on the lights".into()))
            .await
            .unwrap();

        assert_eq!(exchange.reply.text, "Lights are on.");
        assert_eq!(exchange.reply.role, Role::Assistant);
        assert_eq!(exchange.reply.source, "mock");
        assert_eq!(exchange.reply.channel, "chat");
        assert!(exchange.reply.ts > exchange.inbound.ts);

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn backend_failure_keeps_user_record_only() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MockBackend::failing(BackendError::Unavailable(
            "connection refused".into(),
        )));
        let svc = service(store.clone(), backend);

        let err = svc
            .handle(Payload::Text("hello?".into()))
            .await
            .unwrap_err();

        match err {
            Error::Backend(e) => assert!(e.is_retryable()),
            other => panic!("unexpected error: {other}"),
        }

        let records = store.last(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].role, Role::User);
    }

    #[tokio::test]
    async fn invalid_payload_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MockBackend::answering("unused"));
        let svc = service(store.clone(), backend);

        let err = svc.handle(Payload::Text("   ".into())).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prompt_turns_are_ordered_and_unduplicated() {
        let store = Arc::new(InMemoryStore::new());
        let base = Utc::now() - chrono::Duration::hours(2);
        store.put(NewSummary::new(base, "S1")).await.unwrap();
        store
            .put(NewSummary::new(base + chrono::Duration::minutes(5), "S2"))
            .await
            .unwrap();
        store
            .append(NewRecord::user("M1", "chat", "chat"))
            .await
            .unwrap();
        store
            .append(NewRecord::assistant("M2", "mock", "chat"))
            .await
            .unwrap();

        let backend = Arc::new(MockBackend::answering("done"));
        let svc = service(store, backend.clone());

        svc.handle(Payload::Text("M3".into())).await.unwrap();

        let request = backend.last_request();
        let contents: Vec<&str> = request.turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(
            contents,
            ["You are a home assistant.", "S1", "S2", "M1", "M2", "M3"]
        );
        let roles: Vec<TurnRole> = request.turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            [
                TurnRole::System,
                TurnRole::System,
                TurnRole::System,
                TurnRole::User,
                TurnRole::Assistant,
                TurnRole::User
            ]
        );
    }

    #[tokio::test]
    async fn empty_history_still_calls_the_backend() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MockBackend::answering("hello"));
        let svc = service(store, backend.clone());

        let exchange = svc.handle(Payload::Text("first ever".into())).await.unwrap();
        assert_eq!(exchange.reply.text, "hello");

        let request = backend.last_request();
        assert_eq!(request.turns.len(), 2); // system prompt + the new message
    }

    #[tokio::test]
    async fn empty_system_prompt_is_omitted() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MockBackend::answering("ok"));
        let svc = ReplyService::new(
            store.clone(),
            store,
            backend.clone(),
            ContextSettings::default(),
            ReplyConfig {
                model: "llama3".into(),
                temperature: 0.7,
                max_tokens: None,
                system_prompt: String::new(),
            },
        );

        svc.handle(Payload::Text("hi".into())).await.unwrap();
        let request = backend.last_request();
        assert_eq!(request.turns.len(), 1);
        assert_eq!(request.turns[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn webhook_enters_as_event_and_system_turn() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MockBackend::answering("The NAS is down, checking."));
        let svc = service(store.clone(), backend.clone());

        let body = json!({"monitor_name": "NAS", "status": "down"});
        let exchange = svc
            .handle(Payload::webhook("uptime-kuma", body))
            .await
            .unwrap();

        assert_eq!(exchange.inbound.role, Role::Event);
        assert_eq!(exchange.inbound.channel, "monitoring");
        assert_eq!(exchange.reply.channel, "monitoring");

        let request = backend.last_request();
        let last = request.turns.last().unwrap();
        assert_eq!(last.role, TurnRole::System);
        assert!(last.content.contains("NAS is DOWN"));

        let records = store.last(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].role, Role::Event);
        assert_eq!(records[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn model_settings_reach_the_backend() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MockBackend::answering("ok"));
        let svc = ReplyService::new(
            store.clone(),
            store,
            backend.clone(),
            ContextSettings::default(),
            ReplyConfig {
                model: "llama3:70b".into(),
                temperature: 0.2,
                max_tokens: Some(512),
                system_prompt: "x".into(),
            },
        );

        svc.handle(Payload::Text("hi".into())).await.unwrap();
        let request = backend.last_request();
        assert_eq!(request.model, "llama3:70b");
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, Some(512));
    }
}
