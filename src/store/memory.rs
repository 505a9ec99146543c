// src/store/memory.rs
use super::{search_term, window_start, ChatStore, StoreError};
use crate::models::admin::{Analytics, DailyCount, SessionSummary, TranscriptEntry};
use crate::models::chat::{ChatMessage, ChatSession, NewMessage, NewVisitor, SessionUpsert, Visitor};
use crate::models::settings::AssistantSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    visitors: Vec<Visitor>,
    sessions: HashMap<String, ChatSession>,
    messages: Vec<ChatMessage>,
    settings: Option<AssistantSettings>,
    next_visitor_id: i64,
    next_message_id: i64,
}

/// Process-local store used when no database is configured, and by the tests.
/// Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryChatStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves plain data behind, still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn set_last_activity(&self, session_id: &str, at: DateTime<Utc>) {
        if let Some(session) = self.lock().sessions.get_mut(session_id) {
            session.last_activity_at = at;
        }
    }

    #[cfg(test)]
    pub(crate) fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    #[cfg(test)]
    pub(crate) fn message_count(&self) -> usize {
        self.lock().messages.len()
    }
}

fn matches_search(visitor: &Visitor, term: &str) -> bool {
    let term = term.to_lowercase();
    let contains = |value: &str| value.to_lowercase().contains(&term);
    contains(&visitor.name)
        || visitor.email.as_deref().map(contains).unwrap_or(false)
        || visitor.phone.as_deref().map(contains).unwrap_or(false)
}

fn page<T: Clone>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_visitor(&self, visitor: NewVisitor) -> Result<Visitor, StoreError> {
        let mut state = self.lock();
        state.next_visitor_id += 1;
        let now = Utc::now();

        let created = Visitor {
            id: state.next_visitor_id,
            name: visitor.name,
            email: visitor.email,
            phone: visitor.phone,
            cookie_id: uuid::Uuid::new_v4().to_string(),
            ip_address: visitor.ip_address,
            user_agent: visitor.user_agent,
            created_at: now,
            updated_at: now,
        };
        state.visitors.push(created.clone());

        Ok(created)
    }

    async fn find_visitor_by_cookie(&self, cookie_id: &str) -> Result<Option<Visitor>, StoreError> {
        Ok(self
            .lock()
            .visitors
            .iter()
            .find(|v| v.cookie_id == cookie_id)
            .cloned())
    }

    async fn upsert_session(
        &self,
        session_id: &str,
        visitor_id: i64,
        project_id: &str,
    ) -> Result<SessionUpsert, StoreError> {
        let mut state = self.lock();
        let now = Utc::now();

        match state.sessions.get_mut(session_id) {
            Some(session) if session.visitor_id != visitor_id => {
                Err(StoreError::SessionConflict(session_id.to_string()))
            }
            Some(session) => {
                session.last_activity_at = now;
                Ok(SessionUpsert::Refreshed)
            }
            None => {
                state.sessions.insert(
                    session_id.to_string(),
                    ChatSession {
                        id: session_id.to_string(),
                        visitor_id,
                        project_id: project_id.to_string(),
                        started_at: now,
                        last_activity_at: now,
                        ended_at: None,
                        message_count: 0,
                    },
                );
                Ok(SessionUpsert::Created)
            }
        }
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.lock().sessions.get(session_id).cloned())
    }

    async fn save_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let mut state = self.lock();
        let now = Utc::now();

        match state.sessions.get_mut(&message.session_id) {
            None => return Err(StoreError::SessionNotFound(message.session_id)),
            Some(session) if session.visitor_id != message.visitor_id => {
                return Err(StoreError::SessionConflict(message.session_id));
            }
            Some(session) => {
                session.message_count += 1;
                session.last_activity_at = now;
            }
        }

        state.next_message_id += 1;
        let saved = ChatMessage {
            id: state.next_message_id,
            session_id: message.session_id,
            visitor_id: message.visitor_id,
            role: message.role,
            body: message.body,
            metadata: message.metadata,
            created_at: now,
        };
        state.messages.push(saved.clone());

        Ok(saved)
    }

    async fn chat_history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let state = self.lock();
        let messages = state
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        Ok(page(messages, limit, 0))
    }

    async fn recent_messages(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let state = self.lock();
        let mut messages: Vec<ChatMessage> = state
            .messages
            .iter()
            .rev()
            .filter(|m| m.session_id == session_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        messages.reverse();
        Ok(messages)
    }

    async fn list_visitors(
        &self,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> Result<Vec<Visitor>, StoreError> {
        let state = self.lock();
        let term = search_term(search);
        let mut visitors: Vec<Visitor> = state
            .visitors
            .iter()
            .filter(|v| term.map(|t| matches_search(v, t)).unwrap_or(true))
            .cloned()
            .collect();
        visitors.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(visitors, limit, offset))
    }

    async fn count_visitors(&self, search: Option<&str>) -> Result<i64, StoreError> {
        let state = self.lock();
        let term = search_term(search);
        Ok(state
            .visitors
            .iter()
            .filter(|v| term.map(|t| matches_search(v, t)).unwrap_or(true))
            .count() as i64)
    }

    async fn analytics(&self, days: u32) -> Result<Analytics, StoreError> {
        let state = self.lock();
        let since = window_start(days);

        let recent: Vec<&ChatMessage> = state
            .messages
            .iter()
            .filter(|m| m.created_at >= since)
            .collect();

        let mut per_day: BTreeMap<chrono::NaiveDate, i64> = BTreeMap::new();
        for message in &recent {
            *per_day.entry(message.created_at.date_naive()).or_insert(0) += 1;
        }

        let total_users = state.visitors.iter().filter(|v| v.created_at >= since).count();
        let total_sessions = state.sessions.values().filter(|s| s.started_at >= since).count();

        Ok(Analytics::new(
            days,
            recent.len() as i64,
            total_users as i64,
            total_sessions as i64,
            per_day
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
        ))
    }

    async fn list_sessions(
        &self,
        limit: i64,
        offset: i64,
        visitor_id: Option<i64>,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let state = self.lock();
        let mut sessions: Vec<SessionSummary> = state
            .sessions
            .values()
            .filter(|s| visitor_id.map(|id| s.visitor_id == id).unwrap_or(true))
            .map(|s| {
                let visitor = state.visitors.iter().find(|v| v.id == s.visitor_id);
                SessionSummary {
                    id: s.id.clone(),
                    visitor_id: s.visitor_id,
                    project_id: s.project_id.clone(),
                    started_at: s.started_at,
                    last_activity_at: s.last_activity_at,
                    ended_at: s.ended_at,
                    message_count: s.message_count,
                    name: visitor.map(|v| v.name.clone()),
                    email: visitor.and_then(|v| v.email.clone()),
                }
            })
            .collect();
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(page(sessions, limit, offset))
    }

    async fn transcript(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, StoreError> {
        let state = self.lock();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .map(|m| TranscriptEntry {
                id: m.id,
                role: m.role,
                body: m.body.clone(),
                name: state
                    .visitors
                    .iter()
                    .find(|v| v.id == m.visitor_id)
                    .map(|v| v.name.clone()),
                created_at: m.created_at,
            })
            .collect())
    }

    async fn cleanup_old_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock();

        let stale: Vec<String> = state
            .sessions
            .values()
            .filter(|s| s.last_activity_at < cutoff)
            .map(|s| s.id.clone())
            .collect();

        state.messages.retain(|m| !stale.contains(&m.session_id));
        for id in &stale {
            state.sessions.remove(id);
        }

        Ok(stale.len() as u64)
    }

    async fn load_settings(&self) -> Result<AssistantSettings, StoreError> {
        let mut state = self.lock();
        Ok(state.settings.get_or_insert_with(AssistantSettings::default).clone())
    }

    async fn save_settings(&self, settings: &AssistantSettings) -> Result<(), StoreError> {
        self.lock().settings = Some(settings.clone());
        Ok(())
    }
}
