use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::validate_directory;
use crate::Result;

/// Durable snapshot backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotBackend {
    /// Process local map, lost on restart
    Memory,
    /// One file per key under `dir`
    #[default]
    File,
    /// Embedded sled database under `dir`
    Sled,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub backend: SnapshotBackend,

    /// Snapshot storage directory
    ///
    /// Default: `/tmp/snapcache/snapshots`
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            backend: SnapshotBackend::default(),
            dir: default_snapshot_dir(),
        }
    }
}

impl SnapshotConfig {
    pub(super) fn validate(&self) -> Result<()> {
        if self.backend != SnapshotBackend::Memory {
            validate_directory(&self.dir, "snapshot")?;
        }
        Ok(())
    }
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("/tmp/snapcache/snapshots")
}
