use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Override control plane parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlusherConfig {
    /// Interval between two polls of the record source
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for FlusherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl FlusherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "poll_interval_ms cannot be 0".into(),
            )));
        }
        Ok(())
    }
}

// in ms
fn default_poll_interval_ms() -> u64 {
    60_000
}
