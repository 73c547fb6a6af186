use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::utils::key_match::is_prefix_of;
use crate::FlusherError;

/// How a record's `cache_key` is compared against a lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Exact equality
    #[default]
    Full,
    /// The record key roots a `.`/`_` delimited family
    Prefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    #[default]
    Enabled,
    Disabled,
}

/// Whether the record carries a value to serve in place of the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    None,
    Direct,
}

/// One row of the externally administered override table.
///
/// Immutable once fetched. Two polls are compared on `(cache_key, value_version)`;
/// bump the version to invalidate the entries the record covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub cache_key: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub value_version: i64,
    #[serde(default)]
    pub state: RecordState,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub direct_value: Option<Vec<u8>>,
}

impl OverrideRecord {
    pub fn full(
        cache_key: impl Into<String>,
        value_version: i64,
    ) -> Self {
        Self::new(cache_key, MatchMode::Full, value_version)
    }

    pub fn prefix(
        cache_key: impl Into<String>,
        value_version: i64,
    ) -> Self {
        Self::new(cache_key, MatchMode::Prefix, value_version)
    }

    fn new(
        cache_key: impl Into<String>,
        match_mode: MatchMode,
        value_version: i64,
    ) -> Self {
        Self {
            cache_key: cache_key.into(),
            match_mode,
            value_version,
            state: RecordState::Enabled,
            value_type: ValueType::None,
            direct_value: None,
        }
    }

    /// Marks the record as serving `blob` directly
    pub fn with_direct_value(
        mut self,
        blob: impl Into<Vec<u8>>,
    ) -> Self {
        self.value_type = ValueType::Direct;
        self.direct_value = Some(blob.into());
        self
    }

    pub fn with_state(
        mut self,
        state: RecordState,
    ) -> Self {
        self.state = state;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.state == RecordState::Enabled
    }

    pub fn is_direct(&self) -> bool {
        self.value_type == ValueType::Direct
    }

    /// Whether this record covers `key`, regardless of its state.
    ///
    /// This is the one rule used both for lookup and for invalidation.
    pub fn matches(
        &self,
        key: &str,
    ) -> bool {
        match self.match_mode {
            MatchMode::Full => self.cache_key == key,
            MatchMode::Prefix => is_prefix_of(key, &self.cache_key),
        }
    }
}

impl FromStr for MatchMode {
    type Err = FlusherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(MatchMode::Full),
            "prefix" => Ok(MatchMode::Prefix),
            other => Err(FlusherError::InvalidRecord(format!("unknown key match '{other}'"))),
        }
    }
}

impl FromStr for RecordState {
    type Err = FlusherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "enabled" => Ok(RecordState::Enabled),
            "0" | "disabled" => Ok(RecordState::Disabled),
            other => Err(FlusherError::InvalidRecord(format!("unknown cache state '{other}'"))),
        }
    }
}

impl FromStr for ValueType {
    type Err = FlusherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(ValueType::None),
            "direct" => Ok(ValueType::Direct),
            other => Err(FlusherError::InvalidRecord(format!("unknown value type '{other}'"))),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            MatchMode::Full => write!(f, "full"),
            MatchMode::Prefix => write!(f, "prefix"),
        }
    }
}
