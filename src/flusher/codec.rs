use std::collections::HashMap;

use serde::de::DeserializeOwned;

/// Decodes operator supplied override blobs into cache values.
pub trait DirectValueCodec<V>: Send + Sync + 'static {
    /// Blob of a FULL record: the value itself
    fn decode(
        &self,
        blob: &[u8],
    ) -> std::result::Result<V, String>;

    /// Blob of a PREFIX record: one object keyed by sub-key
    fn decode_map(
        &self,
        blob: &[u8],
    ) -> std::result::Result<HashMap<String, V>, String>;
}

/// JSON override blobs
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<V> DirectValueCodec<V> for JsonCodec
where
    V: DeserializeOwned,
{
    fn decode(
        &self,
        blob: &[u8],
    ) -> std::result::Result<V, String> {
        serde_json::from_slice(blob).map_err(|e| e.to_string())
    }

    fn decode_map(
        &self,
        blob: &[u8],
    ) -> std::result::Result<HashMap<String, V>, String> {
        serde_json::from_slice(blob).map_err(|e| e.to_string())
    }
}
