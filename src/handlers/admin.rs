// src/handlers/admin.rs
use crate::export::{export_filename, visitors_csv, EXPORT_LIMIT};
use crate::jobs::run_cleanup;
use crate::middleware::auth::{admin_auth_middleware, issue_admin_token};
use crate::models::admin::{AnalyticsQuery, ForbiddenWordRequest, SessionsQuery, VisitorsQuery};
use crate::models::auth::{AdminLoginRequest, AdminLoginResponse, ErrorResponse};
use crate::models::settings::AssistantSettings;
use crate::services::WordFilter;
use crate::store::StoreError;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use bcrypt::verify;
use serde_json::{json, Value};
use std::sync::Arc;

pub const VISITORS_PER_PAGE: i64 = 100;
pub const SESSIONS_PER_PAGE: i64 = 50;
pub const DEFAULT_PERIOD_DAYS: u32 = 30;
pub const MAX_PERIOD_DAYS: u32 = 365;

type AdminError = (StatusCode, Json<ErrorResponse>);

pub fn admin_routes() -> Router {
    let public_admin = Router::new()
        .route("/admin", get(admin_dashboard))
        .route("/api/admin/login", post(admin_login));

    let protected_admin = Router::new()
        .route("/api/admin/analytics", get(analytics_api))
        .route("/api/admin/visitors", get(visitors_api))
        .route("/api/admin/visitors/export", get(export_visitors))
        .route("/api/admin/sessions", get(sessions_api))
        .route("/api/admin/sessions/:id/messages", get(transcript_api))
        .route("/api/admin/settings", get(get_settings).post(update_settings))
        .route("/api/admin/forbidden-words", post(add_forbidden_word))
        .route("/api/admin/forbidden-words/:word", delete(remove_forbidden_word))
        .route("/api/admin/test-connection", post(test_connection))
        .route("/api/admin/cleanup", post(trigger_cleanup))
        .route_layer(axum::middleware::from_fn(admin_auth_middleware));

    public_admin.merge(protected_admin)
}

fn internal_error(context: &str, e: StoreError) -> AdminError {
    tracing::error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
}

fn bad_request(message: &str) -> AdminError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

/// Pages past the largest addressable offset are clamped to it.
fn page_offset(page: Option<i64>, per_page: i64) -> (i64, i64) {
    let page = page.unwrap_or(1).clamp(1, i64::MAX / per_page);
    (page, (page - 1) * per_page)
}

/// Out-of-range periods are clamped rather than rejected.
pub fn period_days(period: Option<u32>) -> u32 {
    period.unwrap_or(DEFAULT_PERIOD_DAYS).clamp(1, MAX_PERIOD_DAYS)
}

/// The API key is write-only from the dashboard's point of view.
fn settings_json(settings: &AssistantSettings) -> Value {
    let mut value = json!(settings);
    value["api_key"] = json!("");
    value["api_key_configured"] = json!(!settings.api_key.is_empty());
    value
}

async fn admin_login(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>, AdminError> {
    let Some(password_hash) = state.config.admin_password_hash.as_deref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Admin login is not configured")),
        ));
    };

    if payload.password.is_empty() {
        return Err(bad_request("Password is required"));
    }

    match verify(&payload.password, password_hash) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Failed admin login attempt");
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Invalid credentials")),
            ));
        }
        Err(e) => {
            tracing::error!("Error verifying admin password: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            ));
        }
    }

    let (token, expires_at) = issue_admin_token(&state.config.jwt_secret).map_err(|e| {
        tracing::error!("Error generating JWT token: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to generate authentication token")),
        )
    })?;

    tracing::info!("Admin logged in");

    Ok(Json(AdminLoginResponse {
        success: true,
        token,
        expires_at,
    }))
}

async fn analytics_api(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<Value>, AdminError> {
    let analytics = state
        .store
        .analytics(period_days(params.period))
        .await
        .map_err(|e| internal_error("Failed to compute analytics", e))?;

    Ok(Json(json!({ "success": true, "analytics": analytics })))
}

async fn visitors_api(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<VisitorsQuery>,
) -> Result<Json<Value>, AdminError> {
    let (page, offset) = page_offset(params.page, VISITORS_PER_PAGE);
    let search = params.s.as_deref();

    let visitors = state
        .store
        .list_visitors(VISITORS_PER_PAGE, offset, search)
        .await
        .map_err(|e| internal_error("Failed to list visitors", e))?;
    let total = state
        .store
        .count_visitors(search)
        .await
        .map_err(|e| internal_error("Failed to count visitors", e))?;

    Ok(Json(json!({
        "success": true,
        "visitors": visitors,
        "pagination": {
            "page": page,
            "limit": VISITORS_PER_PAGE,
            "total": total,
            "total_pages": (total + VISITORS_PER_PAGE - 1) / VISITORS_PER_PAGE,
        }
    })))
}

async fn export_visitors(Extension(state): Extension<Arc<AppState>>) -> Result<Response, AdminError> {
    let visitors = state
        .store
        .list_visitors(EXPORT_LIMIT, 0, None)
        .await
        .map_err(|e| internal_error("Failed to export visitors", e))?;

    let filename = export_filename(chrono::Utc::now().date_naive());
    tracing::info!(rows = visitors.len(), "Exporting visitors as CSV");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        visitors_csv(&visitors),
    )
        .into_response())
}

async fn sessions_api(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SessionsQuery>,
) -> Result<Json<Value>, AdminError> {
    let (page, offset) = page_offset(params.page, SESSIONS_PER_PAGE);

    let sessions = state
        .store
        .list_sessions(SESSIONS_PER_PAGE, offset, params.user_id)
        .await
        .map_err(|e| internal_error("Failed to list sessions", e))?;

    let has_more = sessions.len() as i64 >= SESSIONS_PER_PAGE;

    Ok(Json(json!({
        "success": true,
        "sessions": sessions,
        "pagination": { "page": page, "limit": SESSIONS_PER_PAGE, "has_more": has_more }
    })))
}

async fn transcript_api(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, AdminError> {
    let messages = state
        .store
        .transcript(&session_id)
        .await
        .map_err(|e| internal_error("Failed to load transcript", e))?;

    Ok(Json(json!({ "success": true, "session_id": session_id, "messages": messages })))
}

async fn get_settings(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, AdminError> {
    let settings = state
        .store
        .load_settings()
        .await
        .map_err(|e| internal_error("Failed to load settings", e))?;

    Ok(Json(json!({ "success": true, "settings": settings_json(&settings) })))
}

/// Partial update: only the submitted keys change. A blank `api_key` keeps
/// the stored one.
async fn update_settings(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AdminError> {
    let Value::Object(changes) = payload else {
        return Err(bad_request("Settings must be a JSON object"));
    };

    let current = state
        .store
        .load_settings()
        .await
        .map_err(|e| internal_error("Failed to load settings", e))?;

    let mut merged = json!(current);
    for (key, value) in changes {
        if key == "api_key" && value.as_str().map(str::trim).unwrap_or("").is_empty() {
            continue;
        }
        if merged.get(&key).is_some() {
            merged[key.as_str()] = value;
        }
    }

    let updated: AssistantSettings = serde_json::from_value(merged)
        .map_err(|e| bad_request(&format!("Invalid settings: {}", e)))?;
    let updated = updated.sanitized();

    state
        .store
        .save_settings(&updated)
        .await
        .map_err(|e| internal_error("Failed to save settings", e))?;

    tracing::info!("Assistant settings updated");

    Ok(Json(json!({ "success": true, "settings": settings_json(&updated) })))
}

async fn add_forbidden_word(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ForbiddenWordRequest>,
) -> Result<Json<Value>, AdminError> {
    let mut settings = state
        .store
        .load_settings()
        .await
        .map_err(|e| internal_error("Failed to load settings", e))?;

    let mut filter = WordFilter::from_list(&settings.forbidden_words);
    if !filter.add(&payload.word) {
        return Err(bad_request("Word is empty, contains a comma, or is already listed"));
    }
    settings.forbidden_words = filter.to_list();

    state
        .store
        .save_settings(&settings)
        .await
        .map_err(|e| internal_error("Failed to save settings", e))?;

    Ok(Json(json!({ "success": true, "words": filter.words() })))
}

async fn remove_forbidden_word(
    Extension(state): Extension<Arc<AppState>>,
    Path(word): Path<String>,
) -> Result<Json<Value>, AdminError> {
    let mut settings = state
        .store
        .load_settings()
        .await
        .map_err(|e| internal_error("Failed to load settings", e))?;

    let mut filter = WordFilter::from_list(&settings.forbidden_words);
    if !filter.remove(&word) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Word is not in the list")),
        ));
    }
    settings.forbidden_words = filter.to_list();

    state
        .store
        .save_settings(&settings)
        .await
        .map_err(|e| internal_error("Failed to save settings", e))?;

    Ok(Json(json!({ "success": true, "words": filter.words() })))
}

async fn test_connection(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, AdminError> {
    let settings = state
        .store
        .load_settings()
        .await
        .map_err(|e| internal_error("Failed to load settings", e))?;

    let check = state.relay_client.test_connection(&settings).await;

    Ok(Json(json!({ "success": check.success, "message": check.message })))
}

async fn trigger_cleanup(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, AdminError> {
    let removed = run_cleanup(&state.store, state.config.session_retention_days)
        .await
        .map_err(|e| internal_error("Chat session cleanup failed", e))?;

    Ok(Json(json!({ "success": true, "removed_sessions": removed })))
}

pub async fn admin_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r###"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Site Assistant - Admin</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f8f9fa; margin: 0; color: #2c3e50; }
        header { background: #2c3e50; color: white; padding: 1rem 2rem; display: flex; justify-content: space-between; align-items: center; }
        nav button { background: none; border: none; color: #cfd8dc; font-size: 1rem; margin-left: 1rem; cursor: pointer; }
        nav button.active { color: white; font-weight: 600; }
        main { max-width: 1100px; margin: 2rem auto; padding: 0 1rem; }
        .card { background: white; border-radius: 10px; box-shadow: 0 4px 14px rgba(0,0,0,0.06); padding: 1.5rem; margin-bottom: 1.5rem; }
        .stats { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; }
        .stat strong { display: block; font-size: 1.8rem; }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 0.5rem; border-bottom: 1px solid #eee; font-size: 0.92rem; }
        input, textarea, select { padding: 0.5rem; border: 1px solid #ddd; border-radius: 6px; font: inherit; }
        label { display: block; margin: 0.6rem 0 0.2rem; font-weight: 600; }
        .btn { padding: 0.5rem 1rem; background: #667eea; color: white; border: none; border-radius: 6px; cursor: pointer; }
        .btn.secondary { background: #6c757d; }
        .hidden { display: none; }
        .msg-visitor { color: #1565c0; }
        .msg-assistant { color: #2e7d32; }
        .tag { display: inline-block; background: #eef; border-radius: 12px; padding: 2px 10px; margin: 2px; }
        .tag button { border: none; background: none; cursor: pointer; color: #c62828; }
        #loginView { max-width: 360px; margin: 6rem auto; }
        .error { color: #c62828; }
    </style>
</head>
<body>
    <div id="loginView" class="card">
        <h2>Admin Login</h2>
        <p id="loginError" class="error"></p>
        <form id="loginForm">
            <label for="password">Password</label>
            <input type="password" id="password" style="width: 100%; box-sizing: border-box;" required>
            <p><button type="submit" class="btn">Sign in</button></p>
        </form>
    </div>

    <div id="appView" class="hidden">
        <header>
            <strong>Site Assistant</strong>
            <nav>
                <button data-tab="analytics" class="active">Analytics</button>
                <button data-tab="visitors">Visitors</button>
                <button data-tab="chats">Chats</button>
                <button data-tab="settings">Settings</button>
                <button id="logout">Log out</button>
            </nav>
        </header>
        <main>
            <section id="tab-analytics">
                <div class="card">
                    Period:
                    <select id="period"><option value="7">7 days</option><option value="30" selected>30 days</option><option value="90">90 days</option></select>
                </div>
                <div class="card stats" id="stats"></div>
                <div class="card"><h3>Messages per day</h3><table id="daily"></table></div>
            </section>

            <section id="tab-visitors" class="hidden">
                <div class="card">
                    <input id="search" placeholder="Search name, email, phone">
                    <button class="btn" id="searchBtn">Search</button>
                    <button class="btn secondary" id="exportBtn">Export CSV</button>
                </div>
                <div class="card"><table id="visitors"></table><p id="visitorPages"></p></div>
            </section>

            <section id="tab-chats" class="hidden">
                <div class="card"><table id="sessions"></table><p><button class="btn secondary" id="moreSessions">Next page</button></p></div>
                <div class="card hidden" id="transcriptCard"><h3 id="transcriptTitle"></h3><div id="transcript"></div></div>
            </section>

            <section id="tab-settings" class="hidden">
                <div class="card">
                    <form id="settingsForm"></form>
                    <p>
                        <button class="btn" id="saveSettings">Save settings</button>
                        <button class="btn secondary" id="testConnection">Test connection</button>
                        <button class="btn secondary" id="runCleanup">Run cleanup now</button>
                    </p>
                    <p id="settingsStatus"></p>
                </div>
                <div class="card">
                    <h3>Forbidden words</h3>
                    <div id="words"></div>
                    <p><input id="newWord" placeholder="Add a word"> <button class="btn" id="addWord">Add</button></p>
                </div>
            </section>
        </main>
    </div>

    <script>
        const TEXT_FIELDS = ['api_url', 'api_key', 'project_id', 'greeting_message', 'greeting_message_fa', 'placeholder_text', 'placeholder_text_fa', 'primary_color', 'rate_limit'];
        const BOOL_FIELDS = ['widget_enabled', 'collect_email', 'collect_phone', 'show_timestamp', 'enable_emojis'];
        const POSITIONS = ['bottom-right', 'bottom-left', 'top-right', 'top-left'];
        let sessionsPage = 1;

        const token = () => localStorage.getItem('assistantAdminToken');
        const esc = (s) => String(s ?? '').replace(/[&<>"']/g, (c) => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[c]));

        async function api(path, options = {}) {
            const response = await fetch(path, {
                ...options,
                headers: { 'Content-Type': 'application/json', 'Authorization': 'Bearer ' + token(), ...(options.headers || {}) },
            });
            if (response.status === 401) { logout(); throw new Error('unauthorized'); }
            return response;
        }

        function logout() {
            localStorage.removeItem('assistantAdminToken');
            document.getElementById('appView').classList.add('hidden');
            document.getElementById('loginView').classList.remove('hidden');
        }

        function showApp() {
            document.getElementById('loginView').classList.add('hidden');
            document.getElementById('appView').classList.remove('hidden');
            loadAnalytics();
        }

        async function loadAnalytics() {
            const period = document.getElementById('period').value;
            const data = await (await api('/api/admin/analytics?period=' + period)).json();
            const a = data.analytics;
            document.getElementById('stats').innerHTML = [
                ['Messages', a.total_messages], ['New visitors', a.total_users],
                ['Sessions', a.total_sessions], ['Avg messages / session', a.avg_messages_per_session],
            ].map(([label, value]) => `<div class="stat"><strong>${esc(value)}</strong>${label}</div>`).join('');
            document.getElementById('daily').innerHTML = '<tr><th>Date</th><th>Messages</th></tr>' +
                a.daily_stats.map((d) => `<tr><td>${esc(d.date)}</td><td>${esc(d.count)}</td></tr>`).join('');
        }

        async function loadVisitors(page = 1) {
            const s = encodeURIComponent(document.getElementById('search').value);
            const data = await (await api(`/api/admin/visitors?page=${page}&s=${s}`)).json();
            document.getElementById('visitors').innerHTML = '<tr><th>ID</th><th>Name</th><th>Email</th><th>Phone</th><th>Created</th><th></th></tr>' +
                data.visitors.map((v) => `<tr><td>${v.id}</td><td>${esc(v.name)}</td><td>${esc(v.email)}</td><td>${esc(v.phone)}</td><td>${esc(v.created_at)}</td>
                    <td><button class="btn secondary" onclick="showVisitorChats(${v.id})">Chats</button></td></tr>`).join('');
            const p = data.pagination;
            document.getElementById('visitorPages').innerHTML = `Page ${p.page} of ${Math.max(p.total_pages, 1)} (${p.total} visitors) ` +
                (p.page > 1 ? `<button class="btn secondary" onclick="loadVisitors(${p.page - 1})">Prev</button> ` : '') +
                (p.page < p.total_pages ? `<button class="btn secondary" onclick="loadVisitors(${p.page + 1})">Next</button>` : '');
        }

        async function loadSessions(visitorId = null) {
            const filter = visitorId ? `&user_id=${visitorId}` : '';
            const data = await (await api(`/api/admin/sessions?page=${sessionsPage}${filter}`)).json();
            document.getElementById('sessions').innerHTML = '<tr><th>Session</th><th>Visitor</th><th>Messages</th><th>Last activity</th><th></th></tr>' +
                data.sessions.map((s) => `<tr><td>${esc(s.id)}</td><td>${esc(s.name)} ${esc(s.email)}</td><td>${s.message_count}</td><td>${esc(s.last_activity_at)}</td>
                    <td><button class="btn secondary" data-session="${esc(s.id)}">View</button></td></tr>`).join('');
            document.querySelectorAll('[data-session]').forEach((b) => b.addEventListener('click', () => loadTranscript(b.dataset.session)));
            document.getElementById('moreSessions').classList.toggle('hidden', !data.pagination.has_more);
        }

        async function loadTranscript(id) {
            const data = await (await api('/api/admin/sessions/' + encodeURIComponent(id) + '/messages')).json();
            document.getElementById('transcriptCard').classList.remove('hidden');
            document.getElementById('transcriptTitle').textContent = 'Session ' + id;
            document.getElementById('transcript').innerHTML = data.messages.map((m) =>
                `<p class="msg-${m.role}"><strong>${m.role === 'visitor' ? esc(m.name || 'Visitor') : 'Assistant'}:</strong> ${esc(m.body)} <small>${esc(m.created_at)}</small></p>`).join('');
        }

        function showVisitorChats(id) {
            sessionsPage = 1;
            switchTab('chats');
            loadSessions(id);
        }

        async function loadSettings() {
            const data = await (await api('/api/admin/settings')).json();
            const s = data.settings;
            const form = document.getElementById('settingsForm');
            form.innerHTML = TEXT_FIELDS.map((f) => `<label for="f-${f}">${f}</label>
                <input id="f-${f}" name="${f}" ${f === 'api_key' ? `type="password" placeholder="${s.api_key_configured ? 'configured, leave blank to keep' : 'not set'}"` : ''} value="${esc(s[f])}" style="width: 100%; box-sizing: border-box;">`).join('') +
                `<label for="f-widget_position">widget_position</label><select id="f-widget_position" name="widget_position">` +
                POSITIONS.map((p) => `<option ${p === s.widget_position ? 'selected' : ''}>${p}</option>`).join('') + '</select>' +
                BOOL_FIELDS.map((f) => `<label><input type="checkbox" name="${f}" ${s[f] ? 'checked' : ''}> ${f}</label>`).join('');
            renderWords(s.forbidden_words.split(',').filter((w) => w.trim()));
        }

        function renderWords(words) {
            document.getElementById('words').innerHTML = words.map((w) =>
                `<span class="tag">${esc(w)} <button data-word="${esc(w)}">&times;</button></span>`).join('') || '<em>None</em>';
            document.querySelectorAll('[data-word]').forEach((b) => b.addEventListener('click', async () => {
                const data = await (await api('/api/admin/forbidden-words/' + encodeURIComponent(b.dataset.word), { method: 'DELETE' })).json();
                if (data.success) renderWords(data.words);
            }));
        }

        async function saveSettings() {
            const form = document.getElementById('settingsForm');
            const payload = {};
            TEXT_FIELDS.forEach((f) => { payload[f] = form.elements[f].value; });
            payload.rate_limit = parseInt(payload.rate_limit, 10) || 1;
            payload.widget_position = form.elements.widget_position.value;
            BOOL_FIELDS.forEach((f) => { payload[f] = form.elements[f].checked; });
            const data = await (await api('/api/admin/settings', { method: 'POST', body: JSON.stringify(payload) })).json();
            document.getElementById('settingsStatus').textContent = data.success ? 'Settings saved.' : data.message;
            if (data.success) loadSettings();
        }

        function switchTab(tab) {
            document.querySelectorAll('nav [data-tab]').forEach((b) => b.classList.toggle('active', b.dataset.tab === tab));
            ['analytics', 'visitors', 'chats', 'settings'].forEach((t) => document.getElementById('tab-' + t).classList.toggle('hidden', t !== tab));
            if (tab === 'analytics') loadAnalytics();
            if (tab === 'visitors') loadVisitors();
            if (tab === 'chats') loadSessions();
            if (tab === 'settings') loadSettings();
        }

        document.getElementById('loginForm').addEventListener('submit', async (e) => {
            e.preventDefault();
            const response = await fetch('/api/admin/login', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ password: document.getElementById('password').value }),
            });
            const data = await response.json();
            if (data.success) {
                localStorage.setItem('assistantAdminToken', data.token);
                showApp();
            } else {
                document.getElementById('loginError').textContent = data.message;
            }
        });

        document.querySelectorAll('nav [data-tab]').forEach((b) => b.addEventListener('click', () => {
            sessionsPage = 1;
            switchTab(b.dataset.tab);
        }));
        document.getElementById('logout').addEventListener('click', logout);
        document.getElementById('period').addEventListener('change', loadAnalytics);
        document.getElementById('searchBtn').addEventListener('click', () => loadVisitors(1));
        document.getElementById('moreSessions').addEventListener('click', () => { sessionsPage += 1; loadSessions(); });
        document.getElementById('saveSettings').addEventListener('click', saveSettings);
        document.getElementById('exportBtn').addEventListener('click', async () => {
            const blob = await (await api('/api/admin/visitors/export')).blob();
            const link = document.createElement('a');
            link.href = URL.createObjectURL(blob);
            link.download = 'chat-users-' + new Date().toISOString().slice(0, 10) + '.csv';
            link.click();
        });
        document.getElementById('testConnection').addEventListener('click', async () => {
            const data = await (await api('/api/admin/test-connection', { method: 'POST' })).json();
            document.getElementById('settingsStatus').textContent = data.message;
        });
        document.getElementById('runCleanup').addEventListener('click', async () => {
            const data = await (await api('/api/admin/cleanup', { method: 'POST' })).json();
            document.getElementById('settingsStatus').textContent = `Removed ${data.removed_sessions} stale sessions.`;
        });
        document.getElementById('addWord').addEventListener('click', async () => {
            const word = document.getElementById('newWord').value;
            const response = await api('/api/admin/forbidden-words', { method: 'POST', body: JSON.stringify({ word }) });
            const data = await response.json();
            if (data.success) {
                document.getElementById('newWord').value = '';
                renderWords(data.words);
            } else {
                alert(data.message);
            }
        });

        if (token()) showApp();
    </script>
</body>
</html>
"###;
