use site_assistant::config::Config;
use site_assistant::store::{MemoryChatStore, PgChatStore, SharedStore};
use site_assistant::{build_router, db, jobs, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = Config::from_env().and_then(|config| {
        config.validate()?;
        Ok(config)
    });
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    let store: SharedStore = match config.database_url.as_deref() {
        Some(url) => {
            let pool = match db::create_pool(url).await {
                Ok(pool) => pool,
                Err(e) => {
                    tracing::error!("Failed to create database pool: {}", e);
                    return Err(e.into());
                }
            };
            tracing::info!("✅ PostgreSQL chat store ready");
            Arc::new(PgChatStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Using the in-memory chat store; nothing survives a restart.");
            Arc::new(MemoryChatStore::new())
        }
    };

    match store.load_settings().await {
        Ok(settings) if settings.relay_configured() => {
            tracing::info!("AI backend configured at {}", settings.api_url)
        }
        Ok(_) => tracing::warn!("AI backend API key not set. Configure it from the admin dashboard."),
        Err(e) => tracing::error!("Failed to load assistant settings: {}", e),
    }

    if config.admin_password_hash.is_none() {
        tracing::warn!("ADMIN_PASSWORD_HASH not set. Admin login disabled; run `hash_admin_password` to create one.");
    }

    let bind_addr = config.bind_addr;
    let retention_days = config.session_retention_days;
    let interval_hours = config.cleanup_interval_hours;

    let shared_state = Arc::new(AppState::new(config, store.clone()));
    let app = build_router(shared_state);

    jobs::spawn_cleanup_loop(store, retention_days, interval_hours);
    tracing::info!(
        "🧹 Session cleanup scheduled every {}h (retention {} days)",
        interval_hours,
        retention_days
    );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,site_assistant=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,site_assistant=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("💬 Site Assistant starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
