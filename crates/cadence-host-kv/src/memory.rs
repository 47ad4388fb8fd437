use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{KvError, KvStore};

/// In-memory KV store implementation.
///
/// Shared between runs by wrapping it in an `Arc`; use a
/// [`NamespacedKvStore`](crate::NamespacedKvStore) to isolate each run.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
  data: RwLock<HashMap<String, String>>,
}

impl InMemoryKvStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored entries across all namespaces.
  pub async fn len(&self) -> usize {
    self.data.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.data.read().await.is_empty()
  }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
  async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
    Ok(self.data.read().await.get(key).cloned())
  }

  async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
    self.data.write().await.insert(key.to_string(), value);
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<bool, KvError> {
    Ok(self.data.write().await.remove(key).is_some())
  }

  async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
    let mut keys: Vec<String> = self
      .data
      .read()
      .await
      .keys()
      .filter(|k| k.starts_with(prefix))
      .cloned()
      .collect();
    keys.sort();
    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_in_memory_kv_store() {
    let store = InMemoryKvStore::new();

    assert_eq!(store.get("key").await.unwrap(), None);

    store.set("key", "value".to_string()).await.unwrap();
    assert_eq!(store.get("key").await.unwrap(), Some("value".to_string()));

    store.set("key", "updated".to_string()).await.unwrap();
    assert_eq!(store.get("key").await.unwrap(), Some("updated".to_string()));

    assert!(store.delete("key").await.unwrap());
    assert!(!store.delete("key").await.unwrap());
    assert_eq!(store.get("key").await.unwrap(), None);
    assert!(store.is_empty().await);
  }

  #[tokio::test]
  async fn test_keys_by_prefix() {
    let store = InMemoryKvStore::new();
    store.set("b/2", "x".to_string()).await.unwrap();
    store.set("a/1", "x".to_string()).await.unwrap();
    store.set("b/1", "x".to_string()).await.unwrap();

    assert_eq!(store.keys("b/").await.unwrap(), vec!["b/1", "b/2"]);
    assert_eq!(store.keys("").await.unwrap().len(), 3);
  }
}
