// lib.rs - Main library file that exports all modules
pub mod config;
pub mod db;
pub mod export;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod relay_client;
pub mod services;
pub mod store;

use axum::{http::StatusCode, response::Json, routing::get, Extension, Router};
use config::Config;
use relay_client::{ChatRelay, RelayClient};
use serde_json::{json, Value};
use services::{MessagePipeline, RequestTokens, VisitorRateLimiter};
use std::sync::Arc;
use store::SharedStore;
use tower_http::cors::CorsLayer;

// AppState holds the chat store, the relay client and the message pipeline built on top of them
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    pub pipeline: MessagePipeline,
    pub relay_client: RelayClient,
    pub request_tokens: RequestTokens,
}

impl AppState {
    pub fn new(config: Config, store: SharedStore) -> Self {
        let relay_client = RelayClient::new(
            config.relay_signing_secret.clone(),
            config.site_url.clone(),
            config.site_locale.clone(),
        );
        let relay: Arc<dyn ChatRelay> = Arc::new(relay_client.clone());
        Self::with_relay(config, store, relay_client, relay)
    }

    /// Same as [`AppState::new`] but with the chat relay swapped out.
    pub fn with_relay(
        config: Config,
        store: SharedStore,
        relay_client: RelayClient,
        relay: Arc<dyn ChatRelay>,
    ) -> Self {
        let pipeline = MessagePipeline::new(store.clone(), relay, VisitorRateLimiter::default());
        let request_tokens = RequestTokens::new(config.nonce_secret.clone());

        Self {
            config,
            store,
            pipeline,
            relay_client,
            request_tokens,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::chat::chat_routes())
        .merge(handlers::widget::widget_routes())
        .merge(handlers::admin::admin_routes())
        .route("/api/status", get(api_status))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let db_status = match state.store.ping().await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::error!("Status check failed to reach the store: {}", e);
            "disconnected"
        }
    };

    let settings = state.store.load_settings().await.ok();
    let relay_configured = settings.as_ref().map(|s| s.relay_configured()).unwrap_or(false);

    // Only configured backends are probed; an empty key never leaves the process.
    let relay_reachable = match settings.as_ref() {
        Some(settings) if relay_configured => state.relay_client.validate_api_key(settings).await,
        _ => false,
    };

    let status = if db_status == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_status,
            "relay_configured": relay_configured,
            "relay_reachable": relay_reachable,
            "request_signing": state.relay_client.signs_requests(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

#[cfg(test)]
mod router_tests;
