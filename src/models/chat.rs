// src/models/chat.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Site visitor, identified by the long-lived cookie token rather than an account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visitor {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cookie_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVisitor {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSession {
    pub id: String,
    pub visitor_id: i64,
    pub project_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub message_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Visitor,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Visitor => "visitor",
            MessageRole::Assistant => "assistant",
        }
    }

    /// The widget still posts `user` for visitor turns.
    pub fn parse(role: &str) -> Option<Self> {
        match role.trim() {
            "visitor" | "user" => Some(MessageRole::Visitor),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub visitor_id: i64,
    pub role: MessageRole,
    pub body: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: String,
    pub visitor_id: i64,
    pub role: MessageRole,
    pub body: String,
    pub metadata: Option<serde_json::Value>,
}

/// A prior turn forwarded to the backend as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for HistoryTurn {
    fn from(message: &ChatMessage) -> Self {
        HistoryTurn {
            role: match message.role {
                MessageRole::Visitor => "user".to_string(),
                MessageRole::Assistant => "assistant".to_string(),
            },
            content: message.body.clone(),
        }
    }
}

/// Result of a successful upsert, so callers can tell a new session from a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpsert {
    Created,
    Refreshed,
}
