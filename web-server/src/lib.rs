//! SkyWatch Web Server
//!
//! Presentation layer over the latest-state cache. Hosts the cache refresh
//! task, so triggered classifications and periodic cycles share one writer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SKYWATCH WEB                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐        ┌──────────────────────────────────┐  │
//! │  │  API      │ reads  │  LatestStateCache (Arc snapshot) │  │
//! │  │  (Axum)   ├───────►│                                  │  │
//! │  └─────┬─────┘        └───────────────▲──────────────────┘  │
//! │        │ trigger / remove             │ commit              │
//! │        ▼                              │                     │
//! │  ┌─────────────┐   cycles   ┌─────────┴───────┐             │
//! │  │ RecordStore │◄───────────┤ Refresh task +  │             │
//! │  │  (SQLite)   │            │ Dispatcher      │             │
//! │  └─────────────┘            └─────────────────┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::task::JoinHandle;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

use skywatch_core::api::Console;
use skywatch_core::logic::cache::{CacheRefresher, LatestStateCache};
use skywatch_core::logic::collector::ResourceSampler;
use skywatch_core::logic::dispatcher::{DispatchConfig, Dispatcher};
use skywatch_core::logic::model::SharedClassifier;
use skywatch_core::logic::storage::SharedStore;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub console: Console,
    pub config: config::Config,
}

/// Wire dispatcher, cache and refresh task together.
///
/// The refresh task runs until every clone of the returned console is dropped.
pub fn start_services(
    store: SharedStore,
    classifier: SharedClassifier,
    sampler: Arc<dyn ResourceSampler>,
    config: &config::Config,
) -> (Console, JoinHandle<()>) {
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        classifier,
        sampler,
        DispatchConfig::from(&config.poller),
    ));
    let cache = Arc::new(LatestStateCache::new());

    let refresher = CacheRefresher::new(
        Arc::clone(&dispatcher),
        Arc::clone(&cache),
        config.poller.sources.clone(),
        config.poller.poll_interval,
    );
    let (task, handle) = refresher.spawn();

    (Console::new(dispatcher, cache, handle), task)
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::images::index))
        .route("/health", get(handlers::health::check))
        .route("/stats", get(handlers::stats::get))

        // Snapshot
        .route("/get_images", get(handlers::images::list).post(handlers::images::list))
        .route("/images/:source_id", get(handlers::images::payload))

        // Commands
        .route("/classify", post(handlers::classify::trigger))
        .route("/remove_sensor", post(handlers::removal::remove_sensor))
        .route("/remove_all", post(handlers::removal::remove_all))

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
