//! Central Configuration Constants
//!
//! Single source of truth for configuration defaults. Every value can be
//! overridden through the environment (see `logic::config`).

/// Default record store location
pub const DEFAULT_DATABASE_URL: &str = "sqlite://skywatch.db";

/// Default pool size for the record store
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Default pause between two dispatcher cycles (seconds)
pub const DEFAULT_POLL_INTERVAL: u64 = 5;

/// Default number of concurrent classification workers
pub const DEFAULT_WORKERS: usize = 2;

/// Default timeout for a single store call (seconds)
pub const DEFAULT_STORAGE_TIMEOUT: u64 = 10;

/// Default timeout for a single classification (seconds)
pub const DEFAULT_CLASSIFY_TIMEOUT: u64 = 30;

/// Default number of simulated sources
pub const DEFAULT_SIM_SOURCES: u32 = 3;

/// Default pause between two inserts of one simulated source (seconds)
pub const DEFAULT_SIM_INTERVAL: u64 = 2;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "SkyWatch";
