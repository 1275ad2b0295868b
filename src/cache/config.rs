//! Configuration for the cache system

use crate::cache::persist::Persist;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Environment variable for the session root id
pub const ENV_ID: &str = "OUROBOROS_CACHE_ID";
/// Environment variable toggling immutable array writes
pub const ENV_IMMUTABLE_ARRAYS: &str = "OUROBOROS_CACHE_IMMUTABLE_ARRAYS";
/// Environment variable for the cooperative yield interval
pub const ENV_YIELD_EVERY: &str = "OUROBOROS_CACHE_YIELD_EVERY";

/// Configuration for a cache
#[derive(Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// First segment of every path in the cache
    pub id: String,

    /// When true, an array write first truncates the stored sequence to the
    /// incoming length, so a shorter write drops stale trailing items.
    /// When false, shorter writes overlay the leading indices only.
    pub use_immutable_arrays: bool,

    /// Array and map writes yield to the scheduler after this many items
    pub yield_every: usize,

    /// Optional persistence hook
    #[serde(skip)]
    pub persist: Option<Arc<dyn Persist>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            id: "root".to_string(),
            use_immutable_arrays: false,
            yield_every: 100,
            persist: None,
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("id", &self.id)
            .field("use_immutable_arrays", &self.use_immutable_arrays)
            .field("yield_every", &self.yield_every)
            .field("persist", &self.persist.is_some())
            .finish()
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.is_empty() {
            return Err("id must not be empty".to_string());
        }

        if self.yield_every == 0 {
            return Err("yield_every must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Load configuration from the environment, reading a `.env` file first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let id = std::env::var(ENV_ID).unwrap_or(defaults.id);

        let use_immutable_arrays = match std::env::var(ENV_IMMUTABLE_ARRAYS) {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                CacheError::ConfigError(format!(
                    "{} must be a boolean, got {:?}",
                    ENV_IMMUTABLE_ARRAYS, raw
                ))
            })?,
            Err(_) => defaults.use_immutable_arrays,
        };

        let yield_every = match std::env::var(ENV_YIELD_EVERY) {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                CacheError::ConfigError(format!(
                    "{} must be a positive integer, got {:?}",
                    ENV_YIELD_EVERY, raw
                ))
            })?,
            Err(_) => defaults.yield_every,
        };

        let config = Self {
            id,
            use_immutable_arrays,
            yield_every,
            persist: None,
        };
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for cache configuration
#[derive(Default)]
pub struct CacheConfigBuilder {
    id: Option<String>,
    use_immutable_arrays: Option<bool>,
    yield_every: Option<usize>,
    persist: Option<Arc<dyn Persist>>,
}

impl CacheConfigBuilder {
    /// Set the session root id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Enable or disable immutable array writes
    pub fn use_immutable_arrays(mut self, enable: bool) -> Self {
        self.use_immutable_arrays = Some(enable);
        self
    }

    /// Set the cooperative yield interval for bulk writes
    pub fn yield_every(mut self, items: usize) -> Self {
        self.yield_every = Some(items);
        self
    }

    /// Attach a persistence hook
    pub fn persist(mut self, persist: Arc<dyn Persist>) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            id: self.id.unwrap_or(defaults.id),
            use_immutable_arrays: self
                .use_immutable_arrays
                .unwrap_or(defaults.use_immutable_arrays),
            yield_every: self.yield_every.unwrap_or(defaults.yield_every),
            persist: self.persist,
        }
    }
}
