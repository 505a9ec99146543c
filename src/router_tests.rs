// End-to-end requests through the full router, on the in-memory store with an
// echoing relay.

use crate::config::Config;
use crate::models::settings::AssistantSettings;
use crate::relay_client::{ChatRelay, RelayClient, RelayError, RelayReply, RelayTurn};
use crate::store::{ChatStore, MemoryChatStore, SharedStore};
use crate::{build_router, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const JWT_SECRET: &str = "router-test-secret-router-test-secret";
const ADMIN_PASSWORD: &str = "correct horse battery staple";

struct EchoRelay;

#[async_trait]
impl ChatRelay for EchoRelay {
    async fn send_message(
        &self,
        _settings: &AssistantSettings,
        turn: &RelayTurn,
    ) -> Result<RelayReply, RelayError> {
        Ok(RelayReply {
            response: format!("You said: {}", turn.message),
            session_id: turn.session_id.clone(),
            metadata: json!({ "turns": turn.history.len() }),
        })
    }
}

struct TestApp {
    router: Router,
    store: MemoryChatStore,
    state: Arc<AppState>,
}

fn test_app() -> TestApp {
    let password_hash = bcrypt::hash(ADMIN_PASSWORD, 4).unwrap();
    let vars: HashMap<&str, String> = HashMap::from([
        ("JWT_SECRET", JWT_SECRET.to_string()),
        ("ADMIN_PASSWORD_HASH", password_hash),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let store = MemoryChatStore::new();
    let shared: SharedStore = Arc::new(store.clone());
    let relay_client = RelayClient::new(None, config.site_url.clone(), config.site_locale.clone());
    let state = Arc::new(AppState::with_relay(
        config,
        shared,
        relay_client,
        Arc::new(EchoRelay),
    ));

    TestApp {
        router: build_router(state.clone()),
        store,
        state,
    }
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, HashMap<String, String>, String) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

async fn nonce(app: &TestApp) -> String {
    let (_, body) = send_json(app, get("/api/widget/config?locale=en_US", None)).await;
    body["data"]["nonce"].as_str().unwrap().to_string()
}

async fn admin_token(app: &TestApp) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "password": ADMIN_PASSWORD }).to_string()))
        .unwrap();
    let (status, body) = send_json(app, request).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_status_reports_store_and_relay() {
    let app = test_app();
    let (status, body) = send_json(&app, get("/api/status", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["relay_configured"], false);
    assert_eq!(body["relay_reachable"], false);
    assert_eq!(body["request_signing"], false);
}

#[tokio::test]
async fn test_status_probes_configured_relay() {
    let app = test_app();
    app.store
        .save_settings(&AssistantSettings {
            api_url: "http://127.0.0.1:1".to_string(),
            api_key: "k-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let (status, body) = send_json(&app, get("/api/status", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["relay_configured"], true);
    assert_eq!(body["relay_reachable"], false);
}

#[tokio::test]
async fn test_widget_config_never_exposes_api_key() {
    let app = test_app();
    let settings = AssistantSettings {
        api_key: "super-secret-key".to_string(),
        ..Default::default()
    };
    app.store.save_settings(&settings).await.unwrap();

    let (status, _, body) = send(&app, get("/api/widget/config?locale=fa_IR", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("super-secret-key"));

    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["greeting"], settings.greeting_message_fa);
    assert_eq!(value["data"]["rtl"], true);
}

#[tokio::test]
async fn test_widget_page_keeps_session_across_page_loads() {
    let app = test_app();
    let (status, _, page) = send(&app, get("/widget", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("sessionStorage.getItem(SESSION_KEY)"));
    assert!(page.contains("state.sessionId = sessionToken();"));
    assert!(!page.contains("state.sessionId = uuid();"));

    app.store
        .save_settings(&AssistantSettings {
            widget_enabled: false,
            ..Default::default()
        })
        .await
        .unwrap();
    let (status, _, page) = send(&app, get("/widget", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_public_endpoints_require_request_token() {
    let app = test_app();
    for uri in ["/api/chat/visitor", "/api/chat/send", "/api/chat/save", "/api/chat/history"] {
        let (status, body) = send_json(&app, form(uri, "nonce=1.abcd&name=Ann")).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["message"], "Invalid security token");
    }
}

#[tokio::test]
async fn test_chat_round_trip() {
    let app = test_app();
    let nonce = nonce(&app).await;

    let (status, headers, body) = send(
        &app,
        form("/api/chat/visitor", &format!("nonce={}&name=Ann&email=ann%40example.com", nonce)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    let cookie_id = body["data"]["cookie_id"].as_str().unwrap().to_string();
    assert!(headers["set-cookie"].starts_with(&format!("site_assistant_visitor={}", cookie_id)));

    let (status, headers, body) = send(
        &app,
        form(
            "/api/chat/send",
            &format!("nonce={}&message=Hello&session_id=sess-1&user_id={}", nonce, cookie_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["data"]["response"], "You said: Hello");
    assert_eq!(body["data"]["sessionId"], "sess-1");
    assert!(headers["set-cookie"].contains("site_assistant_session=sess-1"));
    assert!(headers["set-cookie"].contains("HttpOnly"));

    for (role, message) in [("user", "Hello"), ("assistant", "You+said%3A+Hello")] {
        let (status, _) = send_json(
            &app,
            form(
                "/api/chat/save",
                &format!(
                    "nonce={}&session_id=sess-1&user_id={}&role={}&message={}",
                    nonce, cookie_id, role, message
                ),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send_json(
        &app,
        form("/api/chat/history", &format!("nonce={}&session_id=sess-1", nonce)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["message"], "You said: Hello");

    let session = app.store.find_session("sess-1").await.unwrap().unwrap();
    assert_eq!(session.message_count, 2);
}

#[tokio::test]
async fn test_send_uses_visitor_cookie_when_user_id_missing() {
    let app = test_app();
    let nonce = nonce(&app).await;
    let (_, body) = send_json(&app, form("/api/chat/visitor", &format!("nonce={}&name=Bo", nonce))).await;
    let cookie_id = body["data"]["cookie_id"].as_str().unwrap().to_string();

    // Plain, quoted and percent-encoded forms of the same cookie value.
    let cookie_values = [
        cookie_id.clone(),
        format!("\"{}\"", cookie_id),
        cookie_id.replace('-', "%2D"),
    ];
    for value in cookie_values {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat/send")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, format!("theme=dark; site_assistant_visitor={}", value))
            .body(Body::from(format!("nonce={}&message=Hi&session_id=s-2", nonce)))
            .unwrap();
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::OK, "cookie {} -> {}", value, body);
    }
    assert_eq!(app.store.message_count(), 6);

    // No token in the form and no cookie: explicit rejection.
    let (status, body) = send_json(
        &app,
        form("/api/chat/send", &format!("nonce={}&message=Hi&session_id=s-2", nonce)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["message"], "Missing required fields");
}

#[tokio::test]
async fn test_send_rejections_surface_messages() {
    let app = test_app();
    app.store
        .save_settings(&AssistantSettings {
            forbidden_words: "casino".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let nonce = nonce(&app).await;
    let (_, body) = send_json(&app, form("/api/chat/visitor", &format!("nonce={}&name=Cy", nonce))).await;
    let cookie_id = body["data"]["cookie_id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        form(
            "/api/chat/send",
            &format!("nonce={}&message=Free+CASINO+chips&session_id=s&user_id={}", nonce, cookie_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["message"], "Message contains forbidden content");

    let (status, body) = send_json(
        &app,
        form(
            "/api/chat/send",
            &format!("nonce={}&message=hi&session_id=s&user_id=nobody", nonce),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["message"], "User not found");
}

#[tokio::test]
async fn test_admin_api_requires_token() {
    let app = test_app();
    let (status, _) = send_json(&app, get("/api/admin/analytics", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&app, get("/api/admin/analytics", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "password": "wrong" }).to_string()))
        .unwrap();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_reports_and_export() {
    let app = test_app();
    let token = admin_token(&app).await;
    let nonce = nonce(&app).await;
    send_json(
        &app,
        form("/api/chat/visitor", &format!("nonce={}&name=Doe%2C+Jane&phone=555", nonce)),
    )
    .await;

    let (status, body) = send_json(&app, get("/api/admin/analytics?period=7", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analytics"]["period_days"], 7);
    assert_eq!(body["analytics"]["total_users"], 1);
    assert_eq!(body["analytics"]["avg_messages_per_session"], 0.0);

    let (status, body) = send_json(&app, get("/api/admin/visitors?s=jane", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);

    let huge = format!("/api/admin/visitors?page={}", i64::MAX);
    let (status, body) = send_json(&app, get(&huge, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["visitors"], json!([]));

    let huge = format!("/api/admin/sessions?page={}", i64::MAX);
    let (status, body) = send_json(&app, get(&huge, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["has_more"], false);

    let (status, headers, csv) = send(&app, get("/api/admin/visitors/export", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/csv; charset=utf-8");
    assert!(headers["content-disposition"].starts_with("attachment; filename=chat-users-"));
    assert!(csv.contains("\"Doe, Jane\",,555,"));
}

#[tokio::test]
async fn test_admin_settings_and_forbidden_words() {
    let app = test_app();
    let token = admin_token(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(
            json!({ "api_key": "k-123", "rate_limit": 9999, "primary_color": "nope" }).to_string(),
        ))
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["rate_limit"], 1000);
    assert_eq!(body["settings"]["primary_color"], "#667eea");
    assert_eq!(body["settings"]["api_key"], "");
    assert_eq!(body["settings"]["api_key_configured"], true);

    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/forbidden-words")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(json!({ "word": "Casino" }).to_string()))
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["words"], json!(["casino"]));

    let stored = app.state.store.load_settings().await.unwrap();
    assert_eq!(stored.api_key, "k-123");
    assert_eq!(stored.forbidden_words, "casino");

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/admin/forbidden-words/casino")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["words"], json!([]));
}
