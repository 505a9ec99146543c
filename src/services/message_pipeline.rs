// Visitor message pipeline: validate, filter, rate-limit, upsert the session and
// relay one chat turn. Also owns the save-message and history operations the
// widget calls around each turn.

use super::rate_limit::VisitorRateLimiter;
use super::word_filter::WordFilter;
use crate::models::chat::{ChatMessage, HistoryTurn, MessageRole, NewMessage, SessionUpsert};
use crate::models::settings::AssistantSettings;
use crate::relay_client::{ChatRelay, RelayError, RelayReply, RelayTurn};
use crate::store::{SharedStore, StoreError};
use axum::http::StatusCode;
use std::sync::Arc;
use thiserror::Error;

pub const MAX_MESSAGE_CHARS: usize = 1000;
pub const CONTEXT_TURNS: i64 = 10;
pub const HISTORY_LIMIT: i64 = 50;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Message is too long (max 1000 characters)")]
    TooLong,
    #[error("Message contains forbidden content")]
    ForbiddenContent,
    #[error("User not found")]
    UnknownVisitor,
    #[error("You are sending messages too quickly. Please wait a moment.")]
    RateLimited,
    #[error("Invalid role")]
    InvalidRole,
    #[error("Invalid session")]
    InvalidSession,
    #[error("{0}")]
    Relay(#[from] RelayError),
    #[error("Something went wrong. Please try again.")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionConflict(_) | StoreError::SessionNotFound(_) => {
                PipelineError::InvalidSession
            }
            other => PipelineError::Storage(other),
        }
    }
}

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::MissingFields
            | PipelineError::TooLong
            | PipelineError::ForbiddenContent
            | PipelineError::InvalidRole => StatusCode::BAD_REQUEST,
            PipelineError::UnknownVisitor => StatusCode::NOT_FOUND,
            PipelineError::InvalidSession => StatusCode::CONFLICT,
            PipelineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::Relay(RelayError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Relay(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingFields => "missing_fields",
            PipelineError::TooLong => "too_long",
            PipelineError::ForbiddenContent => "forbidden_content",
            PipelineError::UnknownVisitor => "unknown_visitor",
            PipelineError::RateLimited => "rate_limited",
            PipelineError::InvalidRole => "invalid_role",
            PipelineError::InvalidSession => "invalid_session",
            PipelineError::Relay(_) => "relay",
            PipelineError::Storage(_) => "storage",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message: String,
    pub session_id: String,
    /// Visitor cookie token.
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub session_id: String,
    pub user_id: String,
    pub role: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct MessagePipeline {
    store: SharedStore,
    relay: Arc<dyn ChatRelay>,
    limiter: VisitorRateLimiter,
}

impl MessagePipeline {
    pub fn new(store: SharedStore, relay: Arc<dyn ChatRelay>, limiter: VisitorRateLimiter) -> Self {
        Self {
            store,
            relay,
            limiter,
        }
    }

    /// Runs one visitor turn through to the backend. Nothing is persisted
    /// except the session upsert; the widget saves both turns afterwards.
    pub async fn send_message(
        &self,
        settings: &AssistantSettings,
        input: IncomingMessage,
    ) -> Result<RelayReply, PipelineError> {
        let message = input.message.trim();
        let session_id = input.session_id.trim();
        let user_id = input.user_id.trim();

        if message.is_empty() || session_id.is_empty() || user_id.is_empty() {
            return Err(PipelineError::MissingFields);
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(PipelineError::TooLong);
        }

        if !WordFilter::from_list(&settings.forbidden_words).is_allowed(message) {
            return Err(PipelineError::ForbiddenContent);
        }

        let visitor = self
            .store
            .find_visitor_by_cookie(user_id)
            .await?
            .ok_or(PipelineError::UnknownVisitor)?;

        if !self.limiter.check(visitor.id, settings.rate_limit) {
            return Err(PipelineError::RateLimited);
        }

        let upsert = self
            .store
            .upsert_session(session_id, visitor.id, &settings.project_id)
            .await?;
        if upsert == SessionUpsert::Created {
            tracing::info!(session_id = %session_id, visitor_id = visitor.id, "Chat session started");
        }

        let history = self
            .store
            .recent_messages(session_id, CONTEXT_TURNS)
            .await?
            .iter()
            .map(HistoryTurn::from)
            .collect();

        let turn = RelayTurn {
            session_id: session_id.to_string(),
            visitor_id: visitor.id,
            message: message.to_string(),
            history,
        };

        let reply = self.relay.send_message(settings, &turn).await?;
        Ok(reply)
    }

    pub async fn save_message(&self, record: MessageRecord) -> Result<ChatMessage, PipelineError> {
        let session_id = record.session_id.trim();
        let user_id = record.user_id.trim();
        let body = record.message.trim();

        if session_id.is_empty() || user_id.is_empty() || record.role.trim().is_empty() || body.is_empty() {
            return Err(PipelineError::MissingFields);
        }

        let role = MessageRole::parse(&record.role).ok_or(PipelineError::InvalidRole)?;

        let visitor = self
            .store
            .find_visitor_by_cookie(user_id)
            .await?
            .ok_or(PipelineError::UnknownVisitor)?;

        let saved = self
            .store
            .save_message(NewMessage {
                session_id: session_id.to_string(),
                visitor_id: visitor.id,
                role,
                body: body.to_string(),
                metadata: record.metadata,
            })
            .await?;

        Ok(saved)
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>, PipelineError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(PipelineError::MissingFields);
        }
        Ok(self.store.chat_history(session_id, HISTORY_LIMIT).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{NewVisitor, Visitor};
    use crate::store::{ChatStore, MemoryChatStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubRelay {
        fail: bool,
        turns: Mutex<Vec<RelayTurn>>,
    }

    #[async_trait]
    impl ChatRelay for StubRelay {
        async fn send_message(
            &self,
            _settings: &AssistantSettings,
            turn: &RelayTurn,
        ) -> Result<RelayReply, RelayError> {
            self.turns.lock().unwrap().push(turn.clone());
            if self.fail {
                return Err(RelayError::Http {
                    status: 503,
                    message: Some("Backend overloaded".to_string()),
                });
            }
            Ok(RelayReply {
                response: format!("echo: {}", turn.message),
                session_id: turn.session_id.clone(),
                metadata: serde_json::json!({}),
            })
        }
    }

    struct Harness {
        store: MemoryChatStore,
        relay: Arc<StubRelay>,
        pipeline: MessagePipeline,
        visitor: Visitor,
    }

    async fn harness(fail: bool) -> Harness {
        let store = MemoryChatStore::new();
        let relay = Arc::new(StubRelay {
            fail,
            ..Default::default()
        });
        let pipeline = MessagePipeline::new(
            Arc::new(store.clone()),
            relay.clone(),
            VisitorRateLimiter::default(),
        );
        let visitor = store
            .create_visitor(NewVisitor {
                name: "Sara".to_string(),
                email: None,
                phone: None,
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        Harness {
            store,
            relay,
            pipeline,
            visitor,
        }
    }

    fn incoming(visitor: &Visitor, message: &str) -> IncomingMessage {
        IncomingMessage {
            message: message.to_string(),
            session_id: "sess-1".to_string(),
            user_id: visitor.cookie_id.clone(),
        }
    }

    fn settings() -> AssistantSettings {
        AssistantSettings {
            api_key: "key".to_string(),
            forbidden_words: "spam, casino".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_message_length_boundary() {
        let h = harness(false).await;

        let exact = "é".repeat(MAX_MESSAGE_CHARS);
        let reply = h.pipeline.send_message(&settings(), incoming(&h.visitor, &exact)).await;
        assert!(reply.is_ok());

        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let err = h
            .pipeline
            .send_message(&settings(), incoming(&h.visitor, &over))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TooLong));
        assert_eq!(err.to_string(), "Message is too long (max 1000 characters)");
    }

    #[tokio::test]
    async fn test_forbidden_word_rejected_before_relay() {
        let h = harness(false).await;

        let err = h
            .pipeline
            .send_message(&settings(), incoming(&h.visitor, "Best CASINO deals"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ForbiddenContent));
        assert!(h.relay.turns.lock().unwrap().is_empty());
        assert_eq!(h.store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_visitor_without_token_is_rejected() {
        let h = harness(false).await;

        let mut input = incoming(&h.visitor, "hello");
        input.user_id = "  ".to_string();
        let err = h.pipeline.send_message(&settings(), input).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingFields));

        let mut input = incoming(&h.visitor, "hello");
        input.user_id = "not-a-visitor".to_string();
        let err = h.pipeline.send_message(&settings(), input).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownVisitor));
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn test_rate_limit_applies_per_visitor() {
        let h = harness(false).await;
        let settings = AssistantSettings {
            rate_limit: 2,
            ..settings()
        };

        for _ in 0..2 {
            h.pipeline
                .send_message(&settings, incoming(&h.visitor, "hi"))
                .await
                .unwrap();
        }
        let err = h
            .pipeline
            .send_message(&settings, incoming(&h.visitor, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RateLimited));
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_relay_failure_persists_no_messages() {
        let h = harness(true).await;

        let err = h
            .pipeline
            .send_message(&settings(), incoming(&h.visitor, "hello"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Backend overloaded");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(h.store.message_count(), 0);
    }

    #[tokio::test]
    async fn test_repeat_session_token_reuses_session_and_sends_context() {
        let h = harness(false).await;

        h.pipeline
            .send_message(&settings(), incoming(&h.visitor, "first"))
            .await
            .unwrap();
        h.pipeline
            .save_message(MessageRecord {
                session_id: "sess-1".to_string(),
                user_id: h.visitor.cookie_id.clone(),
                role: "user".to_string(),
                message: "first".to_string(),
                metadata: None,
            })
            .await
            .unwrap();

        let reply = h
            .pipeline
            .send_message(&settings(), incoming(&h.visitor, "second"))
            .await
            .unwrap();

        assert_eq!(reply.response, "echo: second");
        assert_eq!(h.store.session_count(), 1);

        let turns = h.relay.turns.lock().unwrap();
        assert!(turns[0].history.is_empty());
        assert_eq!(
            turns[1].history,
            vec![HistoryTurn {
                role: "user".to_string(),
                content: "first".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_save_message_validates_role_and_session() {
        let h = harness(false).await;
        let record = |role: &str, session: &str| MessageRecord {
            session_id: session.to_string(),
            user_id: h.visitor.cookie_id.clone(),
            role: role.to_string(),
            message: "hello".to_string(),
            metadata: None,
        };

        let err = h.pipeline.save_message(record("system", "sess-1")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRole));

        let err = h.pipeline.save_message(record("assistant", "unknown")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSession));

        h.store
            .upsert_session("sess-1", h.visitor.id, "")
            .await
            .unwrap();
        let saved = h.pipeline.save_message(record("assistant", "sess-1")).await.unwrap();
        assert_eq!(saved.role, MessageRole::Assistant);

        let session = h.store.find_session("sess-1").await.unwrap().unwrap();
        assert_eq!(session.message_count, 1);

        let history = h.pipeline.history("sess-1").await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
