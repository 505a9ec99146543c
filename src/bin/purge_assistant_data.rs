use site_assistant::db::{drop_assistant_tables, ASSISTANT_TABLES};
use sqlx::postgres::PgPoolOptions;
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🗑️  Site Assistant - Purge All Data");
    println!("==========================================");

    dotenvy::dotenv().ok();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("❌ DATABASE_URL must be set in .env file");
        std::process::exit(1);
    };

    println!("This permanently drops the following tables and everything in them:");
    for table in ASSISTANT_TABLES {
        println!("   - {}", table);
    }
    println!();
    print!("Type 'purge' to continue: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    if answer.trim() != "purge" {
        println!("Aborted, nothing was changed.");
        return Ok(());
    }

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    match drop_assistant_tables(&pool).await {
        Ok(()) => println!("✅ All assistant data removed. The schema is re-created on next start."),
        Err(e) => {
            eprintln!("❌ Failed to purge data: {}", e);
            pool.close().await;
            std::process::exit(1);
        }
    }

    pool.close().await;
    Ok(())
}
