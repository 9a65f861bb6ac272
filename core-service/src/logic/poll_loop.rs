//! Continuous polling mode
//!
//! Runs a dispatcher cycle every poll interval and logs its summary. Used by
//! the standalone classifier process; the web server drives cycles through
//! the cache refresh task instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::logic::config::SourceSet;
use crate::logic::dispatcher::{CycleSummary, Dispatcher};

/// Spawn the loop; it runs until the handle is aborted or the runtime stops
pub fn start(dispatcher: Arc<Dispatcher>, sources: SourceSet, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("Poll loop started (every {:?}, sources: {:?})", interval, sources);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let _ = poll_once(&dispatcher, &sources).await;
        }
    })
}

/// One cycle over the configured sources
pub async fn poll_once(dispatcher: &Dispatcher, sources: &SourceSet) -> Option<CycleSummary> {
    let ids = match dispatcher.resolve_sources(sources).await {
        Ok(ids) => ids,
        Err(e) => {
            log::warn!("Could not list sources: {}", e);
            return None;
        }
    };

    if ids.is_empty() {
        log::debug!("No sources to poll");
    }

    let summary = dispatcher.run_cycle(&ids).await.summary();
    log::info!("{}", summary);
    Some(summary)
}
