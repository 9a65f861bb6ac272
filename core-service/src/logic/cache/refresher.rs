//! Cache refresh task
//!
//! Runs a dispatcher cycle on a fixed interval and commits each report into
//! the cache. Triggered single-source passes are queued to the same task, so
//! it stays the only writer of cycle results and a triggered classification
//! always lands in the snapshot before its caller is answered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{CommitScope, LatestStateCache};
use crate::error::{Error, Result};
use crate::logic::config::SourceSet;
use crate::logic::dispatcher::{CycleReport, Dispatcher};
use crate::logic::record::SourceId;

const TRIGGER_QUEUE: usize = 32;

enum Command {
    Trigger {
        source_id: SourceId,
        reply: oneshot::Sender<CycleReport>,
    },
}

/// Cloneable handle for requesting triggered passes
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<Command>,
}

impl RefreshHandle {
    /// Run one pass over `source_id` and wait for its committed report
    pub async fn trigger(&self, source_id: SourceId) -> Result<CycleReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Trigger { source_id, reply })
            .await
            .map_err(|_| Error::Classifier("refresh task is not running".into()))?;

        rx.await
            .map_err(|_| Error::Classifier("refresh task dropped the request".into()))
    }
}

pub struct CacheRefresher {
    dispatcher: Arc<Dispatcher>,
    cache: Arc<LatestStateCache>,
    sources: SourceSet,
    interval: Duration,
}

impl CacheRefresher {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        cache: Arc<LatestStateCache>,
        sources: SourceSet,
        interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            cache,
            sources,
            interval,
        }
    }

    /// Start the task. The first cycle runs immediately, ahead of any
    /// trigger already queued.
    ///
    /// The task stops once every `RefreshHandle` has been dropped.
    pub fn spawn(self) -> (JoinHandle<()>, RefreshHandle) {
        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE);
        let handle = tokio::spawn(self.run(rx));
        (handle, RefreshHandle { tx })
    }

    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        log::info!("Cache refresh task started (every {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Cold start; the first tick completes immediately
        ticker.tick().await;
        self.refresh().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh().await,
                command = rx.recv() => match command {
                    Some(Command::Trigger { source_id, reply }) => {
                        let report = self.triggered(source_id).await;
                        // Caller may have given up waiting; the commit stands either way
                        let _ = reply.send(report);
                    }
                    None => break,
                },
            }
        }

        log::info!("Cache refresh task stopped");
    }

    /// One full cycle, committed
    pub async fn refresh(&self) {
        let since = self.cache.epoch();

        let sources = match self.dispatcher.resolve_sources(&self.sources).await {
            Ok(sources) => sources,
            Err(e) => {
                log::warn!("Skipping refresh, could not list sources: {}", e);
                return;
            }
        };

        let report = self.dispatcher.run_cycle(&sources).await;
        log::info!("{}", report.summary());
        self.cache.commit(&report, since, CommitScope::Full(&sources));
    }

    async fn triggered(&self, source_id: SourceId) -> CycleReport {
        let since = self.cache.epoch();
        let report = self.dispatcher.run_single(source_id).await;
        self.cache.commit(&report, since, CommitScope::Partial);
        report
    }
}
