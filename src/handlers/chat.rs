// src/handlers/chat.rs
//! Public, form-encoded endpoints the widget talks to. Every call carries the
//! request token issued by `/api/widget/config`.

use super::{
    client_ip, cookie_value, envelope, envelope_error, site_cookie, user_agent, EnvelopeError,
    SESSION_COOKIE, SESSION_COOKIE_MAX_AGE, VISITOR_COOKIE, VISITOR_COOKIE_MAX_AGE,
};
use crate::models::chat::{ChatMessage, MessageRole, NewVisitor};
use crate::services::message_pipeline::{IncomingMessage, MessageRecord, PipelineError};
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

const INVALID_TOKEN: &str = "Invalid security token";
const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
const MAX_SESSION_COOKIE_LEN: usize = 128;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn chat_routes() -> Router {
    Router::new()
        .route("/api/chat/visitor", post(save_visitor))
        .route("/api/chat/send", post(send_message))
        .route("/api/chat/save", post(save_message))
        .route("/api/chat/history", post(get_history))
}

#[derive(Debug, Deserialize)]
pub struct VisitorForm {
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct SendForm {
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveForm {
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub message: String,
    /// Optional JSON object, e.g. the relay's reply metadata.
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryForm {
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub session_id: String,
}

fn check_nonce(state: &AppState, nonce: &str) -> Result<(), EnvelopeError> {
    if state.request_tokens.verify(nonce) {
        Ok(())
    } else {
        Err(envelope_error(StatusCode::FORBIDDEN, INVALID_TOKEN))
    }
}

/// Strips control characters and surrounding whitespace from a form field.
fn clean_field(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect::<String>()
        .trim()
        .to_string()
}

fn pipeline_failure(err: PipelineError) -> EnvelopeError {
    match &err {
        PipelineError::Relay(e) => tracing::error!(kind = err.kind(), "Relay call failed: {}", e),
        PipelineError::Storage(e) => tracing::error!(kind = err.kind(), "Chat storage failed: {}", e),
        _ => tracing::warn!(kind = err.kind(), "Chat request rejected: {}", err),
    }
    envelope_error(err.status_code(), err.to_string())
}

/// Only JSON objects are stored; anything else is dropped with a warning.
fn parse_metadata(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            tracing::warn!("Ignoring save-message metadata that is not a JSON object");
            None
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed save-message metadata: {}", e);
            None
        }
    }
}

fn message_json(message: &ChatMessage) -> Value {
    json!({
        "id": message.id,
        "role": match message.role {
            MessageRole::Visitor => "user",
            MessageRole::Assistant => "assistant",
        },
        "message": message.body,
        "metadata": message.metadata,
        "created_at": message.created_at,
    })
}

async fn save_visitor(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<VisitorForm>,
) -> Result<Response, EnvelopeError> {
    check_nonce(&state, &form.nonce)?;

    let name = clean_field(&form.name);
    if name.is_empty() {
        return Err(envelope_error(StatusCode::BAD_REQUEST, "Name is required"));
    }

    let settings = state.store.load_settings().await.map_err(|e| {
        tracing::error!("Failed to load settings: {}", e);
        envelope_error(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
    })?;

    let email = clean_field(&form.email);
    let email = (settings.collect_email && EMAIL.is_match(&email)).then_some(email);
    let phone = clean_field(&form.phone);
    let phone = (settings.collect_phone && !phone.is_empty()).then_some(phone);

    let visitor = state
        .store
        .create_visitor(NewVisitor {
            name: name.chars().take(255).collect(),
            email,
            phone,
            ip_address: client_ip(&headers, connect_info.as_ref()),
            user_agent: user_agent(&headers),
        })
        .await
        .map_err(|e| {
            tracing::error!("Failed to save visitor: {}", e);
            envelope_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save user")
        })?;

    tracing::info!(visitor_id = visitor.id, "New chat visitor registered");

    let cookie = site_cookie(VISITOR_COOKIE, visitor.cookie_id.clone(), VISITOR_COOKIE_MAX_AGE, false);
    Ok((
        jar.add(cookie),
        envelope(json!({ "id": visitor.id, "cookie_id": visitor.cookie_id })),
    )
        .into_response())
}

async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SendForm>,
) -> Result<Response, EnvelopeError> {
    check_nonce(&state, &form.nonce)?;

    let settings = state.store.load_settings().await.map_err(|e| {
        tracing::error!("Failed to load settings: {}", e);
        envelope_error(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
    })?;

    let user_id = if form.user_id.trim().is_empty() {
        cookie_value(&jar, VISITOR_COOKIE).unwrap_or_default()
    } else {
        form.user_id
    };
    let session_id = if form.session_id.trim().is_empty() {
        cookie_value(&jar, SESSION_COOKIE).unwrap_or_default()
    } else {
        form.session_id
    };

    let reply = state
        .pipeline
        .send_message(
            &settings,
            IncomingMessage {
                message: form.message,
                session_id: session_id.clone(),
                user_id,
            },
        )
        .await
        .map_err(pipeline_failure)?;

    let body = envelope(json!({
        "response": reply.response,
        "sessionId": reply.session_id,
        "metadata": reply.metadata,
    }));

    let session_id = session_id.trim();
    if session_id.len() > MAX_SESSION_COOKIE_LEN {
        return Ok(body.into_response());
    }
    let cookie = site_cookie(SESSION_COOKIE, session_id.to_string(), SESSION_COOKIE_MAX_AGE, true);
    Ok((jar.add(cookie), body).into_response())
}

async fn save_message(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<SaveForm>,
) -> Result<Response, EnvelopeError> {
    check_nonce(&state, &form.nonce)?;

    let metadata = form
        .metadata
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .and_then(parse_metadata);

    let saved = state
        .pipeline
        .save_message(MessageRecord {
            session_id: form.session_id,
            user_id: form.user_id,
            role: form.role,
            message: clean_field(&form.message),
            metadata,
        })
        .await
        .map_err(pipeline_failure)?;

    Ok(envelope(json!({ "id": saved.id })).into_response())
}

async fn get_history(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<HistoryForm>,
) -> Result<Response, EnvelopeError> {
    check_nonce(&state, &form.nonce)?;

    if form.session_id.trim().is_empty() {
        return Err(envelope_error(StatusCode::BAD_REQUEST, "Session ID required"));
    }

    let messages = state
        .pipeline
        .history(&form.session_id)
        .await
        .map_err(pipeline_failure)?;

    let messages: Vec<Value> = messages.iter().map(message_json).collect();
    Ok(envelope(json!({ "messages": messages })).into_response())
}
