// -
// Configuration

/// Environment variable prefix for configuration overrides (`SNAPCACHE__ENGINE__...`)
pub(crate) const ENV_PREFIX: &str = "SNAPCACHE";
pub(crate) const ENV_SEPARATOR: &str = "__";
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

// -
// Database namespaces

/// Sled tree holding snapshot records
pub(crate) const SNAPSHOT_TREE: &str = "_snapcache_snapshots";

/// Suffix for in-progress snapshot file writes
pub(crate) const SNAPSHOT_TMP_SUFFIX: &str = ".tmp";
pub(crate) const SNAPSHOT_FILE_SUFFIX: &str = ".snap";

/// Longest escaped key used verbatim as a file name; longer keys are hashed.
/// Leaves room for the suffixes and the per-write temp id under NAME_MAX (255).
pub(crate) const SNAPSHOT_MAX_ESCAPED_KEY_LEN: usize = 200;

// -
// Key matching

/// Characters allowed right after a prefix record key
pub(crate) const PREFIX_SEPARATORS: [char; 2] = ['.', '_'];
