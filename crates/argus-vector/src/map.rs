use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("distributed map transport error: {0}")]
    Transport(String),

    #[error("distributed map returned HTTP {0}")]
    Status(u16),

    #[error("distributed map call timed out")]
    Timeout,

    #[error("distributed map index is corrupt: {0}")]
    CorruptIndex(String),
}

/// Contract of the external distributed cache: a fallible string -> string
/// map. The production implementation talks to Hazelcast; tests use the
/// in-memory variant or a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistributedMap: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, MapError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), MapError>;
    async fn remove(&self, key: &str) -> Result<(), MapError>;
    async fn entries(&self) -> Result<HashMap<String, String>, MapError>;
}

/// Process-local map. Stands in for the cluster when no Hazelcast address
/// is configured; crash recovery is then limited to the process lifetime.
#[derive(Debug, Default)]
pub struct InMemoryMap {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryMap {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedMap for InMemoryMap {
    async fn get(&self, key: &str) -> Result<Option<String>, MapError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), MapError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MapError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn entries(&self) -> Result<HashMap<String, String>, MapError> {
        Ok(self.entries.lock().unwrap().clone())
    }
}
