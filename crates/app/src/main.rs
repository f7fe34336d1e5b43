use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "bank={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;
    let engine = Arc::new(
        engine::Engine::builder()
            .database(db)
            .settings(settings.engine.to_engine_settings())
            .build()
            .await?,
    );

    let bind = settings
        .server
        .bind
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tasks.spawn({
        let engine = Arc::clone(&engine);
        async move {
            if let Err(err) = server::run_with_listener(engine, listener).await {
                tracing::error!("server failed: {err}");
            }
        }
    });
    tasks.spawn(engine::run_accrual_schedule(Arc::clone(&engine)));

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
        Database::Url(url) => url.clone(),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
