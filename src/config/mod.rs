//! Configuration management for the cache.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Config file pointed to by `CONFIG_PATH`
//! 3. Environment variables with `SNAPCACHE__` prefix (highest priority)

mod engine;
mod flusher;
mod snapshot;
pub use engine::*;
pub use flusher::*;
pub use snapshot::*;


//---
use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::path::Path;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_PATH_ENV;
use crate::constants::ENV_PREFIX;
use crate::constants::ENV_SEPARATOR;
use crate::Error;
use crate::Result;

/// Top-level cache configuration.
///
/// Read-only to the engine and flusher; `specs` is a free-form option map
/// passed through untouched to call sites.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// Compute engine parameters
    #[serde(default)]
    pub engine: EngineConfig,
    /// Override control plane parameters
    #[serde(default)]
    pub flusher: FlusherConfig,
    /// Snapshot backend selection
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    /// Caller specific options
    #[serde(default)]
    pub specs: HashMap<String, String>,
}

impl Debug for CacheConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("engine", &self.engine)
            .field("flusher", &self.flusher)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl CacheConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `SNAPCACHE__` prefix
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied with
    /// `with_override_config()`. Call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("SNAPCACHE__FLUSHER__POLL_INTERVAL_MS", "5000");
    /// let cfg = CacheConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file; environment variables still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.engine.validate()?;
        self.flusher.validate()?;
        self.snapshot.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .ignore_empty(true)
        .try_parsing(true)
}

/// Ensures a configured directory path is usable
pub(super) fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Config(ConfigError::Message(format!(
            "{name} path cannot be empty"
        ))));
    }
    Ok(())
}
