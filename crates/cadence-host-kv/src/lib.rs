//! Key-value storage for cadence runs.
//!
//! Steps use a [`KvStore`] to hand intermediate state to later steps of the
//! same run. The engine never gives a step the shared store directly; it
//! wraps it in a [`NamespacedKvStore`] keyed by the run id, so concurrent runs
//! of one workflow cannot see each other's data.

mod memory;
mod namespace;

pub use memory::InMemoryKvStore;
pub use namespace::NamespacedKvStore;

use async_trait::async_trait;

/// Errors returned by store backends.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
  /// The backend could not be reached or refused the operation.
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// Async key-value store.
///
/// This trait is async to support networked backends like Redis.
#[async_trait]
pub trait KvStore: Send + Sync {
  /// Get a value by key.
  async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

  /// Set a value, replacing any previous one.
  async fn set(&self, key: &str, value: String) -> Result<(), KvError>;

  /// Delete a value. Returns whether the key existed.
  async fn delete(&self, key: &str) -> Result<bool, KvError>;

  /// All keys starting with `prefix`, sorted.
  async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}
