use std::sync::Arc;
use std::time::Duration;

use cadence_graph::Direction;
use cadence_host_kv::{InMemoryKvStore, KvStore};
use cadence_host_log::{Logger, Meter, NoopLogger, NoopMeter, NoopTracer, Tracer};
use cadence_host_rpc::{Invoker, Publisher};

/// Collaborators a workflow falls back to when a run does not supply its own.
///
/// The default has no invoker, no publisher, no-op observers, and a fresh
/// in-memory store.
#[derive(Clone)]
pub struct Collaborators {
  pub invoker: Option<Arc<dyn Invoker>>,
  pub publisher: Option<Arc<dyn Publisher>>,
  pub logger: Arc<dyn Logger>,
  pub tracer: Arc<dyn Tracer>,
  pub meter: Arc<dyn Meter>,
  pub store: Arc<dyn KvStore>,
  /// Per-call timeout for invocation steps without their own.
  pub call_timeout: Option<Duration>,
}

impl Default for Collaborators {
  fn default() -> Self {
    Self {
      invoker: None,
      publisher: None,
      logger: Arc::new(NoopLogger),
      tracer: Arc::new(NoopTracer),
      meter: Arc::new(NoopMeter),
      store: Arc::new(InMemoryKvStore::new()),
      call_timeout: None,
    }
  }
}

impl Collaborators {
  pub fn with_invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
    self.invoker = Some(invoker);
    self
  }

  pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
    self.publisher = Some(publisher);
    self
  }

  pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
    self.logger = logger;
    self
  }

  pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
    self.tracer = tracer;
    self
  }

  pub fn with_meter(mut self, meter: Arc<dyn Meter>) -> Self {
    self.meter = meter;
    self
  }

  pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
    self.store = store;
    self
  }

  pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
    self.call_timeout = Some(timeout);
    self
  }
}

impl std::fmt::Debug for Collaborators {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Collaborators")
      .field("invoker", &self.invoker.is_some())
      .field("publisher", &self.publisher.is_some())
      .field("call_timeout", &self.call_timeout)
      .finish_non_exhaustive()
  }
}

/// Per-run options. Every field is optional; a set field wins over the
/// workflow's [`Collaborators`].
#[derive(Clone, Default)]
pub struct ExecuteOptions {
  pub invoker: Option<Arc<dyn Invoker>>,
  pub publisher: Option<Arc<dyn Publisher>>,
  pub logger: Option<Arc<dyn Logger>>,
  pub tracer: Option<Arc<dyn Tracer>>,
  pub meter: Option<Arc<dyn Meter>>,
  pub store: Option<Arc<dyn KvStore>>,
  pub call_timeout: Option<Duration>,
  /// Step to start from instead of the root (or sink, in reverse).
  pub start: Option<String>,
  pub direction: Direction,
  /// Wall-clock budget for the whole run, measured from the call.
  pub deadline: Option<Duration>,
}

impl ExecuteOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
    self.invoker = Some(invoker);
    self
  }

  pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
    self.publisher = Some(publisher);
    self
  }

  pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
    self.logger = Some(logger);
    self
  }

  pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
    self.tracer = Some(tracer);
    self
  }

  pub fn with_meter(mut self, meter: Arc<dyn Meter>) -> Self {
    self.meter = Some(meter);
    self
  }

  pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
    self.call_timeout = Some(timeout);
    self
  }

  pub fn with_start(mut self, step_id: impl Into<String>) -> Self {
    self.start = Some(step_id.into());
    self
  }

  pub fn with_direction(mut self, direction: Direction) -> Self {
    self.direction = direction;
    self
  }

  pub fn reverse(self) -> Self {
    self.with_direction(Direction::Reverse)
  }

  pub fn with_deadline(mut self, deadline: Duration) -> Self {
    self.deadline = Some(deadline);
    self
  }

  /// Overlay these options on `defaults`.
  pub fn merge(&self, defaults: &Collaborators) -> Collaborators {
    Collaborators {
      invoker: self.invoker.clone().or_else(|| defaults.invoker.clone()),
      publisher: self.publisher.clone().or_else(|| defaults.publisher.clone()),
      logger: self.logger.clone().unwrap_or_else(|| defaults.logger.clone()),
      tracer: self.tracer.clone().unwrap_or_else(|| defaults.tracer.clone()),
      meter: self.meter.clone().unwrap_or_else(|| defaults.meter.clone()),
      store: self.store.clone().unwrap_or_else(|| defaults.store.clone()),
      call_timeout: self.call_timeout.or(defaults.call_timeout),
    }
  }
}

impl std::fmt::Debug for ExecuteOptions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExecuteOptions")
      .field("invoker", &self.invoker.is_some())
      .field("call_timeout", &self.call_timeout)
      .field("start", &self.start)
      .field("direction", &self.direction)
      .field("deadline", &self.deadline)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cadence_host_kv::KvStore;

  #[tokio::test]
  async fn test_caller_values_win() {
    let default_store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
    let caller_store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
    let defaults = Collaborators::default()
      .with_store(default_store.clone())
      .with_call_timeout(Duration::from_secs(5));

    let merged = ExecuteOptions::new()
      .with_store(caller_store.clone())
      .with_call_timeout(Duration::from_millis(10))
      .merge(&defaults);

    merged.store.set("k", "v".to_string()).await.unwrap();
    assert_eq!(caller_store.get("k").await.unwrap().as_deref(), Some("v"));
    assert_eq!(default_store.get("k").await.unwrap(), None);
    assert_eq!(merged.call_timeout, Some(Duration::from_millis(10)));
  }

  #[test]
  fn test_unset_options_fall_back() {
    let defaults = Collaborators::default().with_call_timeout(Duration::from_secs(1));
    let merged = ExecuteOptions::new().merge(&defaults);
    assert!(merged.invoker.is_none());
    assert!(merged.publisher.is_none());
    assert_eq!(merged.call_timeout, Some(Duration::from_secs(1)));
  }

  #[test]
  fn test_reverse_sets_direction() {
    let options = ExecuteOptions::new().with_start("b").reverse();
    assert_eq!(options.direction, Direction::Reverse);
    assert_eq!(options.start.as_deref(), Some("b"));
  }
}
