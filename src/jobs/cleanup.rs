// Stale-session cleanup. Sessions idle longer than the retention window are
// deleted together with their messages.

use crate::store::{SharedStore, StoreError};
use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

/// Delay before the first run, so startup is not slowed by a large delete.
const STARTUP_DELAY_SECS: u64 = 60;

pub async fn run_cleanup(store: &SharedStore, retention_days: i64) -> Result<u64, StoreError> {
    let cutoff = Duration::try_days(retention_days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or(StoreError::RetentionOutOfRange(retention_days))?;
    let removed = store.cleanup_old_sessions(cutoff).await?;

    tracing::info!(
        removed_sessions = removed,
        retention_days,
        "🧹 Old chat sessions cleaned up"
    );

    Ok(removed)
}

pub fn spawn_cleanup_loop(store: SharedStore, retention_days: i64, interval_hours: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(STARTUP_DELAY_SECS)).await;

        loop {
            if let Err(e) = run_cleanup(&store, retention_days).await {
                tracing::error!("❌ Chat session cleanup failed: {}", e);
            }

            let interval = interval_hours.saturating_mul(60 * 60);
            tokio::time::sleep(std::time::Duration::from_secs(interval)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{MessageRole, NewMessage, NewVisitor};
    use crate::store::{ChatStore, MemoryChatStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cleanup_keeps_active_sessions() {
        let memory = MemoryChatStore::new();
        let store: SharedStore = Arc::new(memory.clone());

        let visitor = store
            .create_visitor(NewVisitor {
                name: "Omid".to_string(),
                email: None,
                phone: None,
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        for session in ["old", "fresh"] {
            store.upsert_session(session, visitor.id, "").await.unwrap();
            store
                .save_message(NewMessage {
                    session_id: session.to_string(),
                    visitor_id: visitor.id,
                    role: MessageRole::Visitor,
                    body: "hi".to_string(),
                    metadata: None,
                })
                .await
                .unwrap();
        }
        memory.set_last_activity("old", Utc::now() - Duration::days(91));

        let removed = run_cleanup(&store, 90).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.find_session("old").await.unwrap().is_none());
        assert!(store.find_session("fresh").await.unwrap().is_some());
        assert_eq!(memory.message_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_retention_is_an_error() {
        let store: SharedStore = Arc::new(MemoryChatStore::new());

        let err = run_cleanup(&store, i64::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::RetentionOutOfRange(days) if days == i64::MAX));

        let err = run_cleanup(&store, 999_999_999_999_999).await.unwrap_err();
        assert!(matches!(err, StoreError::RetentionOutOfRange(_)));
    }
}
