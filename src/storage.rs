//! Storage backend contract
//!
//! The vault does not own a persistence engine. The host supplies one through
//! the [`Storage`] trait; the backend treats it as an opaque key-value store
//! with atomic writes. Record keys are forward-slash-delimited strings under
//! the `accounts/` and `chains/` namespaces.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;

/// Durable key-value store consumed by the backend.
///
/// Implementations must guarantee atomic `put` semantics: a concurrent reader
/// observes either the previous or the new value of a key, never a torn one.
/// Errors are propagated to the caller unchanged; the backend never retries.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the value stored at `path`, or `None` if the key is absent.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Atomically store `value` at `path`, replacing any existing value.
    async fn put(&self, path: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Remove the value at `path`. Deleting an absent key is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// List the child keys directly under `prefix` in lexicographic order.
    ///
    /// Keys nested more than one level deep appear once as their first path
    /// segment with a trailing `/`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// In-memory [`Storage`] implementation.
///
/// Used by the test suite and useful for embedding. The interior `RwLock`
/// provides the atomic-put guarantee the trait requires.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().await.get(path).cloned())
    }

    async fn put(&self, path: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.entries.write().await.insert(path.to_string(), value);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = Vec::new();
        for key in entries.keys() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let child = match rest.split_once('/') {
                Some((dir, _)) => format!("{dir}/"),
                None => rest.to_string(),
            };
            // BTreeMap iterates in order, so duplicates are adjacent.
            if keys.last() != Some(&child) {
                keys.push(child);
            }
        }
        Ok(keys)
    }
}
