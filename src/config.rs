//! Run configuration, read from the environment.

use std::str::FromStr;

use crate::broadcast::BroadcastAlgorithm;
use crate::error::{CollectiveError, Result};
use crate::reduce::ReduceAlgorithm;

pub const RANKS_ENV: &str = "SIMPLE_COLLECTIVES_RANKS";
pub const BACKEND_ENV: &str = "SIMPLE_COLLECTIVES_BACKEND";
pub const BROADCAST_ENV: &str = "SIMPLE_COLLECTIVES_BROADCAST";
pub const REDUCE_ENV: &str = "SIMPLE_COLLECTIVES_REDUCE";

/// Where the ranks of a run live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Threads of the current process.
    #[default]
    Threads,
    /// Separate processes sharing a memory segment.
    SharedMemory,
}

impl FromStr for Backend {
    type Err = CollectiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threads" | "local" => Ok(Backend::Threads),
            "shm" | "shared-memory" => Ok(Backend::SharedMemory),
            other => Err(CollectiveError::ConfigError(format!("unknown backend {:?}", other))),
        }
    }
}

impl FromStr for BroadcastAlgorithm {
    type Err = CollectiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" => Ok(BroadcastAlgorithm::Tree),
            "linear" => Ok(BroadcastAlgorithm::Linear),
            other => Err(CollectiveError::ConfigError(format!(
                "unknown broadcast algorithm {:?}",
                other
            ))),
        }
    }
}

impl FromStr for ReduceAlgorithm {
    type Err = CollectiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(ReduceAlgorithm::Linear),
            "tree" => Ok(ReduceAlgorithm::Tree),
            other => Err(CollectiveError::ConfigError(format!(
                "unknown reduce algorithm {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Group size.
    pub ranks: usize,
    pub backend: Backend,
    pub broadcast: BroadcastAlgorithm,
    pub reduce: ReduceAlgorithm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ranks: 4,
            backend: Backend::default(),
            broadcast: BroadcastAlgorithm::default(),
            reduce: ReduceAlgorithm::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by any of the `SIMPLE_COLLECTIVES_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], with variables supplied by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        if let Some(ranks) = lookup(RANKS_ENV) {
            config.ranks = ranks.trim().parse().map_err(|_| {
                CollectiveError::ConfigError(format!("{} must be a positive integer, got {:?}", RANKS_ENV, ranks))
            })?;
            if config.ranks == 0 {
                return Err(CollectiveError::ConfigError(format!("{} must be positive", RANKS_ENV)));
            }
        }
        if let Some(backend) = lookup(BACKEND_ENV) {
            config.backend = backend.parse()?;
        }
        if let Some(broadcast) = lookup(BROADCAST_ENV) {
            config.broadcast = broadcast.parse()?;
        }
        if let Some(reduce) = lookup(REDUCE_ENV) {
            config.reduce = reduce.parse()?;
        }
        Ok(config)
    }
}
