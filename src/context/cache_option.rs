use std::collections::HashMap;
use std::time::Duration;

/// Per call site cache parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOption {
    key: String,
    timeout: Option<Duration>,
    specs: HashMap<String, String>,
}

impl CacheOption {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timeout: None,
            specs: HashMap::new(),
        }
    }

    /// Overrides `engine.compute_timeout_ms` for this call site
    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_spec(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.specs.insert(name.into(), value.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn spec(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.specs.get(name).map(String::as_str)
    }

    pub fn specs(&self) -> &HashMap<String, String> {
        &self.specs
    }
}
