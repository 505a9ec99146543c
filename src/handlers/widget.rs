use super::{envelope, envelope_error, EnvelopeError};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn widget_routes() -> Router {
    Router::new()
        .route("/api/widget/config", get(widget_config))
        .route("/widget", get(widget_page))
}

#[derive(Debug, Deserialize)]
pub struct WidgetConfigQuery {
    pub locale: Option<String>,
}

/// Appearance, toggles, endpoints and a fresh request token. The API key
/// stays server side.
async fn widget_config(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<WidgetConfigQuery>,
) -> Result<Json<Value>, EnvelopeError> {
    let settings = state.store.load_settings().await.map_err(|e| {
        tracing::error!("Failed to load settings: {}", e);
        envelope_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong. Please try again.",
        )
    })?;

    let locale = query
        .locale
        .unwrap_or_else(|| state.config.site_locale.clone());
    let (greeting, placeholder) = settings.localized_copy(&locale);

    Ok(envelope(json!({
        "enabled": settings.widget_enabled,
        "position": settings.widget_position,
        "primaryColor": settings.primary_color,
        "greeting": greeting,
        "placeholder": placeholder,
        "showTimestamp": settings.show_timestamp,
        "enableEmojis": settings.enable_emojis,
        "collectEmail": settings.collect_email,
        "collectPhone": settings.collect_phone,
        "rtl": locale.starts_with("fa"),
        "nonce": state.request_tokens.issue(),
        "endpoints": {
            "visitor": "/api/chat/visitor",
            "send": "/api/chat/send",
            "save": "/api/chat/save",
            "history": "/api/chat/history",
        },
    })))
}

async fn widget_page(Extension(state): Extension<Arc<AppState>>) -> Result<Html<String>, StatusCode> {
    let settings = state.store.load_settings().await.map_err(|e| {
        tracing::error!("Failed to load settings: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if !settings.widget_enabled {
        return Ok(Html(String::new()));
    }

    // Both values are whitelisted by settings sanitization.
    let html = WIDGET_TEMPLATE
        .replace("{{POSITION}}", &settings.widget_position)
        .replace("{{PRIMARY_COLOR}}", &settings.primary_color);

    Ok(Html(html))
}

const WIDGET_TEMPLATE: &str = r###"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Assistant</title>
<style>
    :root { --primary: {{PRIMARY_COLOR}}; }
    body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; }
    .sa-widget { position: fixed; z-index: 9999; }
    .sa-widget[data-position="bottom-right"] { bottom: 20px; right: 20px; }
    .sa-widget[data-position="bottom-left"] { bottom: 20px; left: 20px; }
    .sa-widget[data-position="top-right"] { top: 20px; right: 20px; }
    .sa-widget[data-position="top-left"] { top: 20px; left: 20px; }
    .sa-bubble { display: flex; align-items: center; gap: 8px; background: var(--primary); color: #fff; padding: 12px 18px; border-radius: 28px; cursor: pointer; box-shadow: 0 6px 20px rgba(0,0,0,0.2); }
    .sa-window { display: none; flex-direction: column; width: 360px; height: 520px; background: #fff; border-radius: 14px; box-shadow: 0 10px 40px rgba(0,0,0,0.25); overflow: hidden; }
    .sa-header { background: var(--primary); color: #fff; padding: 14px 16px; display: flex; justify-content: space-between; align-items: center; }
    .sa-header button { background: none; border: none; color: #fff; font-size: 18px; cursor: pointer; }
    .sa-messages { flex: 1; overflow-y: auto; padding: 14px; background: #f7f7fb; }
    .sa-message { margin-bottom: 10px; max-width: 80%; padding: 9px 12px; border-radius: 12px; white-space: pre-wrap; word-wrap: break-word; }
    .sa-message.user { margin-left: auto; background: var(--primary); color: #fff; }
    .sa-message.assistant { background: #fff; border: 1px solid #e6e6ef; }
    .sa-time { display: block; font-size: 11px; opacity: 0.7; margin-top: 4px; }
    .sa-typing { display: none; padding: 0 14px 8px; font-size: 12px; color: #888; }
    .sa-form { display: none; padding: 16px; }
    .sa-form input { width: 100%; box-sizing: border-box; margin-bottom: 8px; padding: 9px; border: 1px solid #ddd; border-radius: 8px; }
    .sa-input { display: flex; border-top: 1px solid #eee; }
    .sa-input textarea { flex: 1; border: none; padding: 12px; resize: none; font: inherit; outline: none; }
    .sa-btn { background: var(--primary); color: #fff; border: none; padding: 0 16px; cursor: pointer; border-radius: 0; }
    .sa-form .sa-btn { width: 100%; padding: 10px; border-radius: 8px; }
    .sa-rtl { direction: rtl; }
</style>
</head>
<body>
<div id="sa-widget" class="sa-widget" data-position="{{POSITION}}">
    <div id="sa-bubble" class="sa-bubble">&#128172; <span>Assistant</span></div>
    <div id="sa-window" class="sa-window">
        <div class="sa-header"><strong>AI Assistant</strong><button id="sa-close" aria-label="Close">&times;</button></div>
        <form id="sa-form" class="sa-form">
            <p>Please provide your details to begin chatting</p>
            <input type="text" name="name" placeholder="Your Name*" required>
            <input type="email" name="email" id="sa-email" placeholder="Email Address">
            <input type="tel" name="phone" id="sa-phone" placeholder="Phone Number">
            <button type="submit" class="sa-btn">Start Chatting</button>
        </form>
        <div id="sa-messages" class="sa-messages"></div>
        <div id="sa-typing" class="sa-typing">AI is typing...</div>
        <div class="sa-input">
            <textarea id="sa-text" rows="1" maxlength="1000"></textarea>
            <button id="sa-send" class="sa-btn" aria-label="Send">&#10148;</button>
        </div>
    </div>
</div>
<script>
(function () {
    const VISITOR_COOKIE = 'site_assistant_visitor';
    const SESSION_KEY = 'site_assistant_session';
    const state = { config: null, userId: null, sessionId: null };
    const $ = (id) => document.getElementById(id);

    function getCookie(name) {
        return document.cookie.split('; ').reduce((found, pair) => {
            const [key, value] = pair.split('=');
            return key === name ? decodeURIComponent(value || '') : found;
        }, '');
    }

    // One session per browser tab, kept across page loads so history can be restored.
    function sessionToken() {
        let token = null;
        try {
            token = window.sessionStorage.getItem(SESSION_KEY);
            if (!token) {
                token = uuid();
                window.sessionStorage.setItem(SESSION_KEY, token);
            }
        } catch (err) {
            token = token || uuid();
        }
        return token;
    }

    function uuid() {
        return 'xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx'.replace(/[xy]/g, (c) => {
            const r = Math.random() * 16 | 0;
            return (c === 'x' ? r : (r & 0x3 | 0x8)).toString(16);
        });
    }

    async function post(endpoint, fields) {
        const body = new URLSearchParams(Object.assign({ nonce: state.config.nonce }, fields));
        const response = await fetch(state.config.endpoints[endpoint], {
            method: 'POST',
            credentials: 'same-origin',
            headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
            body,
        });
        return response.json();
    }

    function addMessage(role, content) {
        const div = document.createElement('div');
        div.className = 'sa-message ' + role;
        div.textContent = content;
        if (state.config.showTimestamp) {
            const time = document.createElement('span');
            time.className = 'sa-time';
            time.textContent = new Date().toLocaleTimeString([], { hour: '2-digit', minute: '2-digit' });
            div.appendChild(time);
        }
        $('sa-messages').appendChild(div);
        $('sa-messages').scrollTop = $('sa-messages').scrollHeight;
    }

    function showChat() {
        $('sa-form').style.display = 'none';
        $('sa-messages').style.display = 'block';
    }

    async function loadHistory() {
        const result = await post('history', { session_id: state.sessionId });
        if (result.success && result.data.messages.length) {
            $('sa-messages').innerHTML = '';
            result.data.messages.forEach((m) => addMessage(m.role, m.message));
        }
    }

    async function submitVisitor(event) {
        event.preventDefault();
        const form = new FormData($('sa-form'));
        const result = await post('visitor', {
            name: form.get('name') || '',
            email: form.get('email') || '',
            phone: form.get('phone') || '',
        });
        if (result.success) {
            state.userId = result.data.cookie_id;
            showChat();
        } else {
            alert(result.data.message || 'Error saving your information. Please try again.');
        }
    }

    async function sendMessage() {
        const text = $('sa-text').value.trim();
        if (!text || !state.userId) return;
        $('sa-text').value = '';
        addMessage('user', text);
        $('sa-typing').style.display = 'block';
        $('sa-send').disabled = true;
        try {
            const result = await post('send', { message: text, session_id: state.sessionId, user_id: state.userId });
            if (result.success) {
                addMessage('assistant', result.data.response);
                await post('save', { session_id: state.sessionId, user_id: state.userId, role: 'user', message: text });
                await post('save', {
                    session_id: state.sessionId,
                    user_id: state.userId,
                    role: 'assistant',
                    message: result.data.response,
                    metadata: JSON.stringify(result.data.metadata || {}),
                });
            } else {
                addMessage('assistant', result.data.message || 'Sorry, I encountered an error. Please try again.');
            }
        } catch (err) {
            addMessage('assistant', 'Connection error. Please check your internet and try again.');
        } finally {
            $('sa-typing').style.display = 'none';
            $('sa-send').disabled = false;
        }
    }

    async function init() {
        const response = await fetch('/api/widget/config?locale=' + encodeURIComponent(navigator.language.replace('-', '_')));
        const result = await response.json();
        if (!result.success || !result.data.enabled) return;
        state.config = result.data;
        state.sessionId = sessionToken();

        if (state.config.rtl) $('sa-window').classList.add('sa-rtl');
        $('sa-text').placeholder = state.config.placeholder;
        if (!state.config.collectEmail) $('sa-email').remove();
        if (!state.config.collectPhone) $('sa-phone').remove();
        addMessage('assistant', state.config.greeting);

        state.userId = getCookie(VISITOR_COOKIE) || null;
        if (state.userId) {
            showChat();
            loadHistory();
        } else {
            $('sa-form').style.display = 'block';
            $('sa-messages').style.display = 'none';
        }

        $('sa-bubble').addEventListener('click', () => {
            $('sa-window').style.display = 'flex';
            $('sa-bubble').style.display = 'none';
        });
        $('sa-close').addEventListener('click', () => {
            $('sa-window').style.display = 'none';
            $('sa-bubble').style.display = 'flex';
        });
        $('sa-form').addEventListener('submit', submitVisitor);
        $('sa-send').addEventListener('click', sendMessage);
        $('sa-text').addEventListener('keypress', (e) => {
            if (e.key === 'Enter' && !e.shiftKey) {
                e.preventDefault();
                sendMessage();
            }
        });
    }

    document.addEventListener('DOMContentLoaded', init);
})();
</script>
</body>
</html>
"###;
