// src/store/postgres.rs
use super::{like_pattern, search_term, window_start, ChatStore, StoreError};
use crate::models::admin::{Analytics, DailyCount, SessionSummary, TranscriptEntry};
use crate::models::chat::{
    ChatMessage, ChatSession, MessageRole, NewMessage, NewVisitor, SessionUpsert, Visitor,
};
use crate::models::settings::AssistantSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: i64,
    session_id: String,
    visitor_id: i64,
    role: String,
    body: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = MessageRole::parse(&row.role)
            .ok_or_else(|| StoreError::InvalidRow(format!("unknown role '{}'", row.role)))?;
        Ok(ChatMessage {
            id: row.id,
            session_id: row.session_id,
            visitor_id: row.visitor_id,
            role,
            body: row.body,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

fn into_messages(rows: Vec<MessageRow>) -> Result<Vec<ChatMessage>, StoreError> {
    rows.into_iter().map(ChatMessage::try_from).collect()
}

const MESSAGE_COLUMNS: &str = "id, session_id, visitor_id, role, body, metadata, created_at";

#[async_trait]
impl ChatStore for PgChatStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn create_visitor(&self, visitor: NewVisitor) -> Result<Visitor, StoreError> {
        let cookie_id = uuid::Uuid::new_v4().to_string();

        let created = sqlx::query_as::<_, Visitor>(
            r#"
            INSERT INTO chat_visitors (name, email, phone, cookie_id, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, phone, cookie_id, ip_address, user_agent, created_at, updated_at
            "#,
        )
        .bind(&visitor.name)
        .bind(&visitor.email)
        .bind(&visitor.phone)
        .bind(&cookie_id)
        .bind(&visitor.ip_address)
        .bind(&visitor.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_visitor_by_cookie(&self, cookie_id: &str) -> Result<Option<Visitor>, StoreError> {
        let visitor = sqlx::query_as::<_, Visitor>(
            "SELECT id, name, email, phone, cookie_id, ip_address, user_agent, created_at, updated_at
             FROM chat_visitors WHERE cookie_id = $1",
        )
        .bind(cookie_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(visitor)
    }

    async fn upsert_session(
        &self,
        session_id: &str,
        visitor_id: i64,
        project_id: &str,
    ) -> Result<SessionUpsert, StoreError> {
        // The conditional DO UPDATE returns no row when the token is owned by someone else.
        let row: Option<(bool,)> = sqlx::query_as(
            r#"
            INSERT INTO chat_sessions (id, visitor_id, project_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET last_activity_at = NOW()
            WHERE chat_sessions.visitor_id = EXCLUDED.visitor_id
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(session_id)
        .bind(visitor_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((true,)) => Ok(SessionUpsert::Created),
            Some((false,)) => Ok(SessionUpsert::Refreshed),
            None => Err(StoreError::SessionConflict(session_id.to_string())),
        }
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>, StoreError> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT id, visitor_id, project_id, started_at, last_activity_at, ended_at, message_count
             FROM chat_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn save_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(i64,)> =
            sqlx::query_as("SELECT visitor_id FROM chat_sessions WHERE id = $1 FOR UPDATE")
                .bind(&message.session_id)
                .fetch_optional(&mut *tx)
                .await?;

        match owner {
            None => return Err(StoreError::SessionNotFound(message.session_id)),
            Some((visitor_id,)) if visitor_id != message.visitor_id => {
                return Err(StoreError::SessionConflict(message.session_id));
            }
            Some(_) => {}
        }

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "INSERT INTO chat_messages (session_id, visitor_id, role, body, metadata)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(&message.session_id)
        .bind(message.visitor_id)
        .bind(message.role.as_str())
        .bind(&message.body)
        .bind(&message.metadata)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE chat_sessions
             SET message_count = message_count + 1, last_activity_at = NOW()
             WHERE id = $1",
        )
        .bind(&message.session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        ChatMessage::try_from(row)
    }

    async fn chat_history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM chat_messages
             WHERE session_id = $1
             ORDER BY created_at ASC, id ASC
             LIMIT $2",
            MESSAGE_COLUMNS
        ))
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_messages(rows)
    }

    async fn recent_messages(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM chat_messages
             WHERE session_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
            MESSAGE_COLUMNS
        ))
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = into_messages(rows)?;
        messages.reverse();
        Ok(messages)
    }

    async fn list_visitors(
        &self,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> Result<Vec<Visitor>, StoreError> {
        let visitors = match search_term(search) {
            Some(term) => {
                sqlx::query_as::<_, Visitor>(
                    "SELECT id, name, email, phone, cookie_id, ip_address, user_agent, created_at, updated_at
                     FROM chat_visitors
                     WHERE name ILIKE $1 OR email ILIKE $1 OR phone ILIKE $1
                     ORDER BY created_at DESC, id DESC
                     LIMIT $2 OFFSET $3",
                )
                .bind(like_pattern(term))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Visitor>(
                    "SELECT id, name, email, phone, cookie_id, ip_address, user_agent, created_at, updated_at
                     FROM chat_visitors
                     ORDER BY created_at DESC, id DESC
                     LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(visitors)
    }

    async fn count_visitors(&self, search: Option<&str>) -> Result<i64, StoreError> {
        let total: (i64,) = match search_term(search) {
            Some(term) => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM chat_visitors
                     WHERE name ILIKE $1 OR email ILIKE $1 OR phone ILIKE $1",
                )
                .bind(like_pattern(term))
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM chat_visitors")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(total.0)
    }

    async fn analytics(&self, days: u32) -> Result<Analytics, StoreError> {
        let since = window_start(days);

        let total_messages: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        let total_users: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_visitors WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        let total_sessions: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_sessions WHERE started_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        let daily_stats = sqlx::query_as::<_, DailyCount>(
            "SELECT DATE(created_at) AS date, COUNT(*) AS count
             FROM chat_messages
             WHERE created_at >= $1
             GROUP BY DATE(created_at)
             ORDER BY date ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(Analytics::new(
            days,
            total_messages.0,
            total_users.0,
            total_sessions.0,
            daily_stats,
        ))
    }

    async fn list_sessions(
        &self,
        limit: i64,
        offset: i64,
        visitor_id: Option<i64>,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = sqlx::query_as::<_, SessionSummary>(
            "SELECT s.id, s.visitor_id, s.project_id, s.started_at, s.last_activity_at,
                    s.ended_at, s.message_count, v.name, v.email
             FROM chat_sessions s
             LEFT JOIN chat_visitors v ON s.visitor_id = v.id
             WHERE ($1::BIGINT IS NULL OR s.visitor_id = $1)
             ORDER BY s.last_activity_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(visitor_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn transcript(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, String, String, Option<String>, DateTime<Utc>)>(
            "SELECT m.id, m.role, m.body, v.name, m.created_at
             FROM chat_messages m
             LEFT JOIN chat_visitors v ON m.visitor_id = v.id
             WHERE m.session_id = $1
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, role, body, name, created_at)| {
                let role = MessageRole::parse(&role)
                    .ok_or_else(|| StoreError::InvalidRow(format!("unknown role '{}'", role)))?;
                Ok(TranscriptEntry {
                    id,
                    role,
                    body,
                    name,
                    created_at,
                })
            })
            .collect()
    }

    async fn cleanup_old_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chat_messages
             WHERE session_id IN (SELECT id FROM chat_sessions WHERE last_activity_at < $1)",
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM chat_sessions WHERE last_activity_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(deleted)
    }

    async fn load_settings(&self) -> Result<AssistantSettings, StoreError> {
        let stored: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT settings FROM assistant_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match stored {
            Some((value,)) => Ok(serde_json::from_value(value)?),
            None => {
                let defaults = AssistantSettings::default();
                sqlx::query(
                    "INSERT INTO assistant_settings (id, settings) VALUES (1, $1)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(serde_json::to_value(&defaults)?)
                .execute(&self.pool)
                .await?;
                tracing::info!("Seeded default assistant settings");
                Ok(defaults)
            }
        }
    }

    async fn save_settings(&self, settings: &AssistantSettings) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO assistant_settings (id, settings, updated_at) VALUES (1, $1, NOW())
             ON CONFLICT (id) DO UPDATE SET settings = EXCLUDED.settings, updated_at = NOW()",
        )
        .bind(serde_json::to_value(settings)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
