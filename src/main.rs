mod app;
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod notifications;
mod rate_limit;
mod response;
mod state;

use std::sync::Arc;

use app::build_router;
use auth::jwt::TokenManager;
use auth::oauth::ProviderRegistry;
use auth::password::PasswordManager;
use auth::services::CredentialService;
use config::Config;
use db::Repository;
use notifications::{LoggingEmailSender, NotificationQueue, NotificationWorker};
use rate_limit::RateLimiter;
use state::AppState;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Si RUST_LOG n'est pas défini, utiliser ces règles par défaut
        tracing_subscriber::EnvFilter::new("info,credential_service=debug,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Base PostgreSQL si configurée, sinon dépôt en mémoire (dev uniquement).
fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn Repository>> {
    match &config.database_url {
        Some(url) => {
            let pool = db::connection::create_pool(url, db::connection::DEFAULT_POOL_SIZE)?;
            tracing::info!("🗄️  Using PostgreSQL repository");
            Ok(Arc::new(db::postgres::PgRepository::new(pool)))
        }
        None => {
            tracing::warn!("⚠️  Using in-memory repository (data is lost on restart)");
            Ok(Arc::new(db::memory::InMemoryRepository::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

// ----------------- Main -----------------

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    // Initialize logging for all environments
    setup_logging();
    tracing::info!("Starting credential-service...");

    let config = Config::from_env()?;
    let repo = build_repository(&config)?;

    let tokens = Arc::new(TokenManager::new(
        &config.jwt_access_secret,
        &config.jwt_refresh_secret,
        config.access_token_ttl,
        config.refresh_token_ttl,
    ));

    // Envoi des emails sur sa propre tâche, indépendante des requêtes
    let (queue, outbox) = NotificationQueue::new(config.email_queue_capacity);
    let worker_shutdown = CancellationToken::new();
    let worker = NotificationWorker::new(Arc::new(LoggingEmailSender))
        .spawn(outbox, worker_shutdown.clone());

    let service = CredentialService::new(repo, tokens.clone(), queue)
        .with_password_manager(PasswordManager::new(config.bcrypt_cost))
        .with_providers(Arc::new(ProviderRegistry::from_config(&config.oauth)))
        .with_session_ttl(config.session_ttl);

    let state = AppState::new(Arc::new(service), tokens, config.request_timeout);
    let rate_limiter = RateLimiter::new(config.rate_limit_per_second, config.rate_limit_burst);
    if rate_limiter.is_none() {
        tracing::warn!("Global rate limit disabled");
    }
    let app = build_router(
        state,
        Some(config.frontend_url.as_str()),
        rate_limiter.map(Arc::new),
    );

    if std::env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
        tracing::info!("Running in Lambda mode");
        lambda_http::run(app).await
    } else {
        tracing::info!("Running in local HTTP server mode");
        let addr = format!("{}:{}", config.server_host, config.server_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("🚀 Server running at http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        worker_shutdown.cancel();
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Notification worker panicked");
        }

        Ok(())
    }
}
