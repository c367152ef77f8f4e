use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use user_sync_api::config::{Config, LogFormat, StoreBackend};
use user_sync_api::database::{self, AuditLedger, InMemorySyncStore, PgSyncStore, UserDirectory};
use user_sync_api::services::SvixVerifier;
use user_sync_api::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Configuration errors are fatal: the webhook secret must be present before serving.
    let config = Arc::new(Config::from_env()?);

    init_tracing(config.log_format);
    info!(?config, "Configuration loaded");

    let verifier = Arc::new(SvixVerifier::new(
        &config.webhook_secret,
        config.webhook_tolerance_secs,
    )?);

    let (audit, users): (Arc<dyn AuditLedger>, Arc<dyn UserDirectory>) = match config.store_backend {
        StoreBackend::Postgres => {
            let db_pool = database::new_pool(&config.database_url).await?;
            info!("Database connection pool created");
            database::run_migrations(&db_pool).await?;
            let store = Arc::new(PgSyncStore::new(db_pool));
            let audit: Arc<dyn AuditLedger> = store.clone();
            let users: Arc<dyn UserDirectory> = store;
            (audit, users)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; synced users are lost on restart");
            let store = Arc::new(InMemorySyncStore::new());
            let audit: Arc<dyn AuditLedger> = store.clone();
            let users: Arc<dyn UserDirectory> = store;
            (audit, users)
        }
    };

    let app_state = AppState::new(verifier, audit, users);
    let app = create_router(app_state, config.max_body_bytes);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("Webhook endpoint: http://{}{}", addr, user_sync_api::WEBHOOK_PATH);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "user_sync_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
