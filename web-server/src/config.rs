//! Configuration module

use std::env;

use skywatch_core::logic::config::{PollerConfig, StoreConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Record store shared with the simulator and classifier processes
    pub store: StoreConfig,

    /// Refresh cadence, worker count and source selection
    pub poller: PollerConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> skywatch_core::Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            store: StoreConfig::from_env()?,
            poller: PollerConfig::from_env()?,
        })
    }
}
