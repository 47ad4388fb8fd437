use std::sync::Arc;

use async_trait::async_trait;

use crate::{KvError, KvStore};

const SEPARATOR: char = '/';

/// A view of a base store restricted to one namespace.
///
/// Keys are stored in the base as `{namespace}/{key}`.
#[derive(Clone)]
pub struct NamespacedKvStore {
  base: Arc<dyn KvStore>,
  prefix: String,
}

impl NamespacedKvStore {
  pub fn new(base: Arc<dyn KvStore>, namespace: impl AsRef<str>) -> Self {
    Self {
      base,
      prefix: format!("{}{}", namespace.as_ref(), SEPARATOR),
    }
  }

  /// The namespace this view is bound to.
  pub fn namespace(&self) -> &str {
    self.prefix.trim_end_matches(SEPARATOR)
  }

  fn scoped(&self, key: &str) -> String {
    format!("{}{}", self.prefix, key)
  }
}

impl std::fmt::Debug for NamespacedKvStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NamespacedKvStore")
      .field("namespace", &self.namespace())
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl KvStore for NamespacedKvStore {
  async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
    self.base.get(&self.scoped(key)).await
  }

  async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
    self.base.set(&self.scoped(key), value).await
  }

  async fn delete(&self, key: &str) -> Result<bool, KvError> {
    self.base.delete(&self.scoped(key)).await
  }

  async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
    let keys = self.base.keys(&self.scoped(prefix)).await?;
    Ok(
      keys
        .into_iter()
        .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
        .collect(),
    )
  }
}
