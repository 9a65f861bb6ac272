//! SkyWatch simulator - concurrent drone sources writing into the record store

use std::sync::Arc;

use skywatch_core::constants::{APP_NAME, APP_VERSION};
use skywatch_core::logic::config::{SimulatorConfig, StoreConfig};
use skywatch_core::logic::simulator::{ImageDirectory, PayloadSource, SourceGenerator, SyntheticImages};
use skywatch_core::logic::storage::SqliteStore;
use skywatch_core::Result;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let store_config = StoreConfig::from_env()?;
    let config = SimulatorConfig::from_env()?;

    log::info!("Starting {} simulator v{}", APP_NAME, APP_VERSION);

    let payloads: Arc<dyn PayloadSource> = match &config.image_dir {
        Some(dir) => Arc::new(ImageDirectory::load(dir)?),
        None => {
            log::info!("SIM_IMAGE_DIR not set, using synthetic images");
            Arc::new(SyntheticImages::default())
        }
    };
    let store = Arc::new(SqliteStore::connect(&store_config).await?);
    let generator = SourceGenerator::new(store, payloads, config);

    tokio::select! {
        report = generator.run() => {
            for unit in &report.units {
                log::info!("Drone {}: {} inserted, {} failed", unit.source_id, unit.inserted, unit.failed);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, stopping all sources");
        }
    }

    Ok(())
}
