use tracing_subscriber::EnvFilter;

use axum::extract::Request;
use axum::ServiceExt;

use tours_api_rust::app::{service, AppState};
use tours_api_rust::config::config;
use tours_api_rust::database::DatabaseManager;
use tours_api_rust::services::mail;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config();
    let default_filter = if config.api.enable_request_logging { "info,tower_http=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    config.validate()?;
    tracing::info!("Starting Tours API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database)?;

    // Postgres may come up after us; /health reports 503 until it does
    if let Err(e) = DatabaseManager::migrate(&pool).await {
        tracing::warn!("Skipping schema setup, database not reachable: {}", e);
    }

    let state = AppState::new(pool.clone(), mail::from_config(&config.mail));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Tours API listening on http://{}", bind_addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(service(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    DatabaseManager::close(&pool).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
