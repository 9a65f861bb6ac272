//! SkyWatch classifier - continuous polling mode
//!
//! Usage:
//!   skywatch-classifier              poll every configured interval
//!   skywatch-classifier drone_<id>   run one triggered pass and exit

use std::sync::Arc;

use skywatch_core::constants::{APP_NAME, APP_VERSION};
use skywatch_core::logic::collector::SysinfoSampler;
use skywatch_core::logic::config::{PollerConfig, StoreConfig};
use skywatch_core::logic::dispatcher::{DispatchConfig, Dispatcher};
use skywatch_core::logic::model::{DigestClassifier, Vocabulary};
use skywatch_core::logic::poll_loop;
use skywatch_core::logic::storage::SqliteStore;
use skywatch_core::Result;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(std::env::args().nth(1)).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(table: Option<String>) -> Result<()> {
    let store_config = StoreConfig::from_env()?;
    let poller = PollerConfig::from_env()?;

    log::info!("Starting {} classifier v{}", APP_NAME, APP_VERSION);

    let vocabulary = match &poller.labels_path {
        Some(path) => Vocabulary::from_file(path)?,
        None => Vocabulary::default(),
    };
    let classifier = Arc::new(DigestClassifier::new(vocabulary));
    let store = Arc::new(SqliteStore::connect(&store_config).await?);

    let dispatcher = Arc::new(Dispatcher::new(
        store,
        classifier.clone(),
        Arc::new(SysinfoSampler::new()),
        DispatchConfig::from(&poller),
    ));

    if let Some(table) = table {
        let report = dispatcher.run_triggered(&table).await?;
        if let Some(failure) = report.failures.first() {
            return Err(failure.error.clone());
        }
        println!("{}", report.summary());
        return Ok(());
    }

    let handle = poll_loop::start(dispatcher, poller.sources.clone(), poller.poll_interval);

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Could not listen for Ctrl-C: {}", e);
    }
    handle.abort();

    let status = classifier.status();
    log::info!(
        "Shutting down after {} classification(s), mean latency {:.2}ms",
        status.inference_count,
        status.avg_latency_ms
    );
    Ok(())
}
