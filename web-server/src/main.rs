use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skywatch_core::constants::{APP_NAME, APP_VERSION};
use skywatch_core::logic::collector::SysinfoSampler;
use skywatch_core::logic::model::{DigestClassifier, Vocabulary};
use skywatch_core::logic::storage::SqliteStore;
use skywatch_web::{config, create_router, start_services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize logging; core crate `log` records come through the bridge
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "skywatch_web=debug,skywatch_core=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env().context("invalid configuration")?;

    tracing::info!("{} web server v{} starting ({})", APP_NAME, APP_VERSION, config.environment);
    tracing::info!("Record store: {}", config.store.database_url);

    let store = SqliteStore::connect(&config.store)
        .await
        .context("failed to open the record store")?;

    let vocabulary = match &config.poller.labels_path {
        Some(path) => Vocabulary::from_file(path).context("failed to load labels")?,
        None => Vocabulary::default(),
    };

    let (console, refresh_task) = start_services(
        Arc::new(store),
        Arc::new(DigestClassifier::new(vocabulary)),
        Arc::new(SysinfoSampler::new()),
        &config,
    );

    let state = AppState {
        console,
        config: config.clone(),
    };
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    refresh_task.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
    }
    tracing::info!("Shutdown requested");
}
