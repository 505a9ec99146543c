use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyCount {
    pub date: chrono::NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub period_days: u32,
    pub total_messages: i64,
    pub total_users: i64,
    pub total_sessions: i64,
    pub avg_messages_per_session: f64,
    pub daily_stats: Vec<DailyCount>,
}

impl Analytics {
    pub fn new(
        period_days: u32,
        total_messages: i64,
        total_users: i64,
        total_sessions: i64,
        daily_stats: Vec<DailyCount>,
    ) -> Self {
        let avg_messages_per_session = if total_sessions > 0 {
            (total_messages as f64 / total_sessions as f64 * 10.0).round() / 10.0
        } else {
            0.0
        };

        Analytics {
            period_days,
            total_messages,
            total_users,
            total_sessions,
            avg_messages_per_session,
            daily_stats,
        }
    }
}

/// Session row for the chat-history list, joined with its visitor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionSummary {
    pub id: String,
    pub visitor_id: i64,
    pub project_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub message_count: i32,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: i64,
    pub role: crate::models::chat::MessageRole,
    pub body: String,
    pub name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct VisitorsQuery {
    pub page: Option<i64>,
    pub s: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    pub page: Option<i64>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ForbiddenWordRequest {
    pub word: String,
}
