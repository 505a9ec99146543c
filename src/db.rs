// src/db.rs
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Tables owned by the assistant, children first.
pub const ASSISTANT_TABLES: [&str; 4] = [
    "chat_messages",
    "chat_sessions",
    "chat_visitors",
    "assistant_settings",
];

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    // Run migrations on startup
    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// Drops every assistant table plus the migration ledger, so the next start
/// re-creates the schema from scratch.
pub async fn drop_assistant_tables(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for table in ASSISTANT_TABLES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
            .execute(&mut *tx)
            .await?;
        tracing::info!("Dropped table {}", table);
    }

    sqlx::query("DROP TABLE IF EXISTS _sqlx_migrations")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
