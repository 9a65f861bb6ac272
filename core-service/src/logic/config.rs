//! Runtime configuration, read from the environment with defaults from
//! `constants`. A variable that is set but unparsable is a start-up error
//! rather than a silent fallback.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::logic::record::SourceId;

/// Look up one variable. Abstracted so tests can feed a map instead of the process env.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, key: &str) -> Option<String> {
        self(key)
    }
}

fn parse_var<T: FromStr>(env: &impl EnvSource, key: &str, default: T) -> Result<T> {
    match env.var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

fn parse_bool(env: &impl EnvSource, key: &str, default: bool) -> Result<bool> {
    match env.var(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(Error::Config(format!("{} has an invalid value '{}'", key, v))),
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(env: &impl EnvSource) -> Result<Self> {
        let max_connections = parse_var(env, "SKYWATCH_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(Error::Config("SKYWATCH_DB_MAX_CONNECTIONS must be at least 1".into()));
        }

        Ok(Self {
            database_url: env
                .var("SKYWATCH_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections,
        })
    }
}

// ============================================================================
// POLLER / DISPATCHER
// ============================================================================

/// Which sources a cycle covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SourceSet {
    /// Exactly these sources
    Fixed(Vec<SourceId>),
    /// Whatever tables the store holds at cycle start
    Discover,
}

impl FromStr for SourceSet {
    type Err = Error;

    /// `discover`, a count (`3` means sources 0, 1, 2) or an id list (`1,4,7`)
    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("discover") {
            return Ok(SourceSet::Discover);
        }

        let invalid = || Error::Config(format!("'{}' is not a source count or id list", raw));

        if raw.contains(',') {
            let mut ids = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<SourceId>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>>>()?;
            ids.sort_unstable();
            ids.dedup();
            return Ok(SourceSet::Fixed(ids));
        }

        let count: SourceId = raw.parse().map_err(|_| invalid())?;
        Ok(SourceSet::Fixed((0..count).collect()))
    }
}

/// How the dispatcher finds a source's newest record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanMode {
    /// Full scan plus in-process max-by-timestamp
    FullScan,
    /// Storage-side "latest" query with the same ordering
    LatestQuery,
}

impl FromStr for ScanMode {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "scan" | "full" => Ok(ScanMode::FullScan),
            "latest" => Ok(ScanMode::LatestQuery),
            other => Err(Error::Config(format!("unknown scan mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Concurrency width of the dispatcher, independent of source count
    pub workers: usize,
    pub sources: SourceSet,
    pub scan_mode: ScanMode,
    pub storage_timeout: Duration,
    pub classify_timeout: Duration,
    /// Vocabulary file, one category per line; built-in list when absent
    pub labels_path: Option<PathBuf>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            workers: DEFAULT_WORKERS,
            sources: SourceSet::Discover,
            scan_mode: ScanMode::FullScan,
            storage_timeout: Duration::from_secs(DEFAULT_STORAGE_TIMEOUT),
            classify_timeout: Duration::from_secs(DEFAULT_CLASSIFY_TIMEOUT),
            labels_path: None,
        }
    }
}

impl PollerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(env: &impl EnvSource) -> Result<Self> {
        let workers = parse_var(env, "SKYWATCH_WORKERS", DEFAULT_WORKERS)?;
        if workers == 0 {
            return Err(Error::Config("SKYWATCH_WORKERS must be at least 1".into()));
        }

        let poll_interval = parse_var(env, "SKYWATCH_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?;
        if poll_interval == 0 {
            return Err(Error::Config("SKYWATCH_POLL_INTERVAL_SECS must be at least 1".into()));
        }

        Ok(Self {
            poll_interval: Duration::from_secs(poll_interval),
            workers,
            sources: parse_var(env, "SKYWATCH_SOURCES", SourceSet::Discover)?,
            scan_mode: parse_var(env, "SKYWATCH_SCAN_MODE", ScanMode::FullScan)?,
            storage_timeout: Duration::from_secs(parse_var(env, "SKYWATCH_STORAGE_TIMEOUT_SECS", DEFAULT_STORAGE_TIMEOUT)?),
            classify_timeout: Duration::from_secs(parse_var(env, "SKYWATCH_CLASSIFY_TIMEOUT_SECS", DEFAULT_CLASSIFY_TIMEOUT)?),
            labels_path: env.var("SKYWATCH_LABELS_PATH").map(PathBuf::from),
        })
    }
}

// ============================================================================
// SIMULATOR
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Number of simulated sources, ids `0..sources`
    pub sources: u32,
    /// Pause between two inserts of one source
    pub interval: Duration,
    /// Shared deadline; `None` runs until the process stops
    pub duration: Option<Duration>,
    /// Truncate each source's table before its first insert
    pub reset: bool,
    /// Directory of sample images to pick payloads from
    pub image_dir: Option<PathBuf>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SIM_SOURCES,
            interval: Duration::from_secs(DEFAULT_SIM_INTERVAL),
            duration: None,
            reset: false,
            image_dir: None,
        }
    }
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(env: &impl EnvSource) -> Result<Self> {
        let interval = parse_var(env, "SIM_INTERVAL_SECS", DEFAULT_SIM_INTERVAL)?;
        if interval == 0 {
            return Err(Error::Config("SIM_INTERVAL_SECS must be at least 1".into()));
        }

        let duration = match env.var("SIM_DURATION_SECS") {
            Some(_) => Some(Duration::from_secs(parse_var(env, "SIM_DURATION_SECS", 0u64)?)),
            None => None,
        };

        Ok(Self {
            sources: parse_var(env, "SIM_SOURCES", DEFAULT_SIM_SOURCES)?,
            interval: Duration::from_secs(interval),
            duration,
            reset: parse_bool(env, "SIM_RESET", false)?,
            image_dir: env.var("SIM_IMAGE_DIR").map(PathBuf::from),
        })
    }
}
