use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// What a caller gets when its timeout elapses and no snapshot exists
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMissPolicy {
    /// Keep waiting for the in-flight producer without bound
    #[default]
    KeepWaiting,
    /// Return `ComputeError::SnapshotUnavailable` immediately
    Fail,
}

/// Compute engine parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Default time a caller waits for the producer before consulting the snapshot
    #[serde(default = "default_compute_timeout_ms")]
    pub compute_timeout_ms: u64,

    #[serde(default)]
    pub snapshot_miss_policy: SnapshotMissPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compute_timeout_ms: default_compute_timeout_ms(),
            snapshot_miss_policy: SnapshotMissPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn compute_timeout(&self) -> Duration {
        Duration::from_millis(self.compute_timeout_ms)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.compute_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "compute_timeout_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }
}

// in ms
fn default_compute_timeout_ms() -> u64 {
    1000
}
