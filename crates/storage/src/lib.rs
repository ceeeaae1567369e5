//! Durable key-value storage for rerouter state.
//!
//! Each key maps to one JSON document (`<key>.json`) in an `object_store`
//! backend. A write replaces the whole value; there are no partial updates.

pub mod backend;
pub mod error;

use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use object_store::PutPayload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use rerouter_core::config::{StorageBackendKind, StorageConfig};

pub use backend::{LocalBackend, MemoryBackend, StorageBackend};
pub use error::StorageError;

/// JSON key-value store over a [`StorageBackend`].
pub struct KvStore {
    backend: StorageBackend,
}

impl KvStore {
    pub fn new(backend: StorageBackend) -> Self {
        Self { backend }
    }

    /// Create a store from config. Selects local or in-memory backend.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let backend = match config.backend {
            StorageBackendKind::Local => StorageBackend::Local(LocalBackend::new(&config.data_dir)?),
            StorageBackendKind::Memory => StorageBackend::Memory(MemoryBackend::new()),
        };
        Ok(Self::new(backend))
    }

    /// Store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(StorageBackend::Memory(MemoryBackend::new()))
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    fn location(key: &str) -> ObjectPath {
        ObjectPath::from(format!("{key}.json"))
    }

    /// Read raw bytes for a key. Missing keys are `None`, not an error.
    pub async fn get_raw(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        match self.backend.store().get(&Self::location(key)).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and deserialize a key.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(bytes) = self.get_raw(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| StorageError::Json {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    /// Read a key, falling back to `default` when it has never been written.
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StorageError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Serialize and replace the value for a key.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StorageError::Json {
            key: key.to_string(),
            source,
        })?;
        let len = bytes.len();
        self.backend
            .store()
            .put(&Self::location(key), PutPayload::from(bytes))
            .await?;
        debug!(key, bytes = len, "stored value");
        Ok(())
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.backend.store().delete(&Self::location(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
