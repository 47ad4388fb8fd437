use std::sync::Arc;
use std::time::Duration;

use cadence_host_kv::{KvStore, NamespacedKvStore};
use cadence_host_log::{Logger, Meter, Tracer};
use cadence_host_rpc::{Invoker, Publisher};
use tokio_util::sync::CancellationToken;

use crate::Collaborators;

/// Everything a step sees while it runs.
///
/// The store is scoped to the run id, so two runs of the same workflow never
/// observe each other's writes.
#[derive(Clone)]
pub struct StepContext {
  run_id: String,
  workflow_id: String,
  cancel: CancellationToken,
  collaborators: Collaborators,
}

impl StepContext {
  pub fn new(
    run_id: impl Into<String>,
    workflow_id: impl Into<String>,
    collaborators: &Collaborators,
    cancel: CancellationToken,
  ) -> Self {
    let run_id = run_id.into();
    let scoped: Arc<dyn KvStore> = Arc::new(NamespacedKvStore::new(
      collaborators.store.clone(),
      &run_id,
    ));
    Self {
      workflow_id: workflow_id.into(),
      cancel,
      collaborators: collaborators.clone().with_store(scoped),
      run_id,
    }
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  /// Cancelled when any step of the run fails, or the caller cancels.
  pub fn cancel(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn store(&self) -> &Arc<dyn KvStore> {
    &self.collaborators.store
  }

  pub fn invoker(&self) -> Option<&Arc<dyn Invoker>> {
    self.collaborators.invoker.as_ref()
  }

  pub fn publisher(&self) -> Option<&Arc<dyn Publisher>> {
    self.collaborators.publisher.as_ref()
  }

  pub fn logger(&self) -> &dyn Logger {
    self.collaborators.logger.as_ref()
  }

  pub fn tracer(&self) -> &dyn Tracer {
    self.collaborators.tracer.as_ref()
  }

  pub fn meter(&self) -> &dyn Meter {
    self.collaborators.meter.as_ref()
  }

  pub fn call_timeout(&self) -> Option<Duration> {
    self.collaborators.call_timeout
  }
}

impl std::fmt::Debug for StepContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepContext")
      .field("run_id", &self.run_id)
      .field("workflow_id", &self.workflow_id)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cadence_host_kv::InMemoryKvStore;

  #[tokio::test]
  async fn test_store_is_scoped_to_run() {
    let base: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
    let collaborators = Collaborators::default().with_store(base.clone());
    let ctx = StepContext::new("run-1", "orders", &collaborators, CancellationToken::new());

    ctx.store().set("total", "42".to_string()).await.unwrap();

    assert_eq!(base.get("run-1/total").await.unwrap().as_deref(), Some("42"));
    assert_eq!(ctx.run_id(), "run-1");
    assert_eq!(ctx.workflow_id(), "orders");
    assert!(ctx.invoker().is_none());
  }
}
