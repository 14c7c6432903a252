use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use studio_auth::config::AuthConfig;
use studio_auth::db::MongoDb;
use studio_auth::services::{RateLimitService, RedisRevocationStore};
use studio_auth::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    let config = Arc::new(AuthConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting auth service"
    );

    let mongo = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    mongo.initialize_indexes().await?;
    let mongo = Arc::new(mongo);

    let revocation = Arc::new(RedisRevocationStore::connect(&config.redis.url).await?);

    let rate_limiter = RateLimitService::new(mongo.clone());
    let state = AppState::new(config.clone(), mongo, revocation, rate_limiter)?;

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
