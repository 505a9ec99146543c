// src/store/mod.rs
//! Persistence for visitors, sessions, messages and the settings record.
//!
//! Handlers and the message pipeline only see [`ChatStore`]; production runs on
//! [`postgres::PgChatStore`], local development without `DATABASE_URL` and the test
//! suite run on [`memory::MemoryChatStore`].

pub mod memory;
pub mod postgres;

use crate::models::admin::{Analytics, SessionSummary, TranscriptEntry};
use crate::models::chat::{ChatMessage, ChatSession, NewMessage, NewVisitor, SessionUpsert, Visitor};
use crate::models::settings::AssistantSettings;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

pub type SharedStore = Arc<dyn ChatStore>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Session {0} belongs to another visitor")]
    SessionConflict(String),
    #[error("Session {0} not found")]
    SessionNotFound(String),
    #[error("Invalid row: {0}")]
    InvalidRow(String),
    #[error("Retention of {0} days is out of range")]
    RetentionOutOfRange(i64),
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn create_visitor(&self, visitor: NewVisitor) -> Result<Visitor, StoreError>;

    async fn find_visitor_by_cookie(&self, cookie_id: &str) -> Result<Option<Visitor>, StoreError>;

    /// Inserts the session if the token is unseen, otherwise refreshes its
    /// last activity. Never touches `message_count`.
    async fn upsert_session(
        &self,
        session_id: &str,
        visitor_id: i64,
        project_id: &str,
    ) -> Result<SessionUpsert, StoreError>;

    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>, StoreError>;

    /// Appends a message and bumps the owning session's counter atomically.
    async fn save_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// Oldest-first messages of a session, at most `limit`.
    async fn chat_history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError>;

    /// The newest `limit` messages of a session, returned oldest-first.
    async fn recent_messages(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError>;

    async fn list_visitors(
        &self,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> Result<Vec<Visitor>, StoreError>;

    async fn count_visitors(&self, search: Option<&str>) -> Result<i64, StoreError>;

    async fn analytics(&self, days: u32) -> Result<Analytics, StoreError>;

    async fn list_sessions(
        &self,
        limit: i64,
        offset: i64,
        visitor_id: Option<i64>,
    ) -> Result<Vec<SessionSummary>, StoreError>;

    async fn transcript(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, StoreError>;

    /// Deletes sessions idle since before `cutoff` and their messages.
    /// Returns the number of sessions removed.
    async fn cleanup_old_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Returns the stored settings, seeding the defaults on first use.
    async fn load_settings(&self) -> Result<AssistantSettings, StoreError>;

    async fn save_settings(&self, settings: &AssistantSettings) -> Result<(), StoreError>;
}

/// Midnight (UTC) `days` days ago, the lower bound of the reporting window.
pub fn window_start(days: u32) -> DateTime<Utc> {
    let start = Utc::now() - Duration::days(days as i64);
    start
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(start)
}

/// Case-insensitive `LIKE` pattern with wildcards in the search term escaped.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Non-empty trimmed search term, if any.
pub(crate) fn search_term(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}
