use std::fmt::Write;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use nanoid::nanoid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::warn;

use super::SnapshotRecord;
use super::SnapshotStore;
use crate::constants::SNAPSHOT_FILE_SUFFIX;
use crate::constants::SNAPSHOT_MAX_ESCAPED_KEY_LEN;
use crate::constants::SNAPSHOT_TMP_SUFFIX;
use crate::Result;
use crate::SnapshotError;

/// Stores each snapshot as one bincode file under `dir`.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader sees either the previous snapshot or the new one.
pub struct FileSnapshotStore<V> {
    dir: PathBuf,
    _value: PhantomData<fn() -> V>,
}

impl<V> FileSnapshotStore<V> {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            _value: PhantomData,
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub(crate) fn path_for(
        &self,
        key: &str,
    ) -> PathBuf {
        self.dir.join(format!("{}{}", file_stem(key), SNAPSHOT_FILE_SUFFIX))
    }

    /// Temporary path unique to one write of `path`
    fn tmp_path_for(path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(format!(".{}{}", nanoid!(), SNAPSHOT_TMP_SUFFIX));
        PathBuf::from(tmp)
    }
}

/// File name (without suffix) for `key`.
///
/// Short keys keep their escaped form. Keys whose escaped form would exceed
/// the file name limit are stored under `%%` followed by the hex SHA-256 of
/// the key; `%%` never appears in an escaped key. Collisions are caught by the
/// key stored inside the record.
pub(crate) fn file_stem(key: &str) -> String {
    let escaped = escape_key(key);
    if escaped.len() <= SNAPSHOT_MAX_ESCAPED_KEY_LEN {
        return escaped;
    }

    let mut stem = String::with_capacity(66);
    stem.push_str("%%");
    for b in Sha256::digest(key.as_bytes()) {
        let _ = write!(stem, "{:02x}", b);
    }
    stem
}

/// Maps an arbitrary key to a file name: `[A-Za-z0-9.-]` kept, every other byte
/// written as `%XX`.
pub(crate) fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            escaped.push(b as char);
        } else {
            let _ = write!(escaped, "%{:02X}", b);
        }
    }
    escaped
}

#[async_trait]
impl<V> SnapshotStore<V> for FileSnapshotStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn save(
        &self,
        key: &str,
        value: V,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let record = SnapshotRecord::new(key, value);
        let bytes = bincode::serialize(&record)?;

        let path = self.path_for(key);
        let tmp = Self::tmp_path_for(&path);
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(SnapshotError::IoError(e).into());
        }

        debug!(key, ?path, "snapshot written");
        Ok(())
    }

    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SnapshotError::IoError(e).into()),
        };

        let record: SnapshotRecord<V> = bincode::deserialize(&bytes)?;
        if record.key != key {
            warn!(key, stored = %record.key, "snapshot file belongs to another key, ignoring");
            return Ok(None);
        }
        Ok(Some(record.value))
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::IoError(e).into()),
        }
    }
}
