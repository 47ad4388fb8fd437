//! Steps: the units of work a workflow schedules.

use std::time::Duration;

use cadence_config::{StepDef, StepKindDef};
use cadence_host_log::Level;
use cadence_host_rpc::{CallOptions, Payload};
use tracing::debug;

use crate::context::StepContext;
use crate::error::StepError;

/// A remote call to `target.operation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationStep {
  pub target: String,
  pub operation: String,
  /// Wins over the run's call timeout when set.
  pub timeout: Option<Duration>,
  /// Run-store key receiving the JSON response.
  pub output_key: Option<String>,
}

/// A fire-and-forget emission on `topic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStep {
  pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
  Invocation(InvocationStep),
  Event(EventStep),
}

/// A named unit of work plus the ids of the steps it requires.
///
/// The id is the graph key. Two steps with the same id are the same node to
/// the workflow and the last one registered replaces the other, so callers
/// must keep ids unique (use [`Step::with_id`] when derived ids collide).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
  id: String,
  requires: Vec<String>,
  kind: StepKind,
}

impl Step {
  /// Invocation step with id `"{target}.{operation}"`.
  pub fn invoke(target: impl Into<String>, operation: impl Into<String>) -> Self {
    let target = target.into();
    let operation = operation.into();
    Self {
      id: format!("{}.{}", target, operation),
      requires: Vec::new(),
      kind: StepKind::Invocation(InvocationStep {
        target,
        operation,
        timeout: None,
        output_key: None,
      }),
    }
  }

  /// Event step whose id is the topic.
  pub fn publish(topic: impl Into<String>) -> Self {
    let topic = topic.into();
    Self {
      id: topic.clone(),
      requires: Vec::new(),
      kind: StepKind::Event(EventStep { topic }),
    }
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = id.into();
    self
  }

  /// No effect on event steps.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    if let StepKind::Invocation(call) = &mut self.kind {
      call.timeout = Some(timeout);
    }
    self
  }

  /// No effect on event steps.
  pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
    if let StepKind::Invocation(call) = &mut self.kind {
      call.output_key = Some(key.into());
    }
    self
  }

  /// Depend on other steps by their ids.
  pub fn require(self, steps: &[&Step]) -> Self {
    self.requires_ids(steps.iter().map(|s| s.id.clone()))
  }

  /// Depend on raw step ids. Duplicates are ignored.
  pub fn requires_ids<I, S>(mut self, ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for id in ids {
      let id = id.into();
      if !self.requires.contains(&id) {
        self.requires.push(id);
      }
    }
    self
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn requires(&self) -> &[String] {
    &self.requires
  }

  pub fn kind(&self) -> &StepKind {
    &self.kind
  }

  pub fn is_invocation(&self) -> bool {
    matches!(self.kind, StepKind::Invocation(_))
  }

  /// Run the step once. The engine never retries.
  pub async fn execute(&self, ctx: &StepContext, request: &Payload) -> Result<(), StepError> {
    match &self.kind {
      StepKind::Invocation(call) => self.invoke_remote(call, ctx, request).await,
      StepKind::Event(event) => self.emit(event, ctx, request).await,
    }
  }

  async fn invoke_remote(
    &self,
    call: &InvocationStep,
    ctx: &StepContext,
    request: &Payload,
  ) -> Result<(), StepError> {
    let invoker = ctx.invoker().ok_or_else(|| StepError::MissingInvoker {
      step_id: self.id.clone(),
    })?;
    if ctx.cancel().is_cancelled() {
      return Err(StepError::Cancelled);
    }

    // Retries stay off so a failure reaches the engine and cancels the run.
    let options = CallOptions {
      timeout: call.timeout.or(ctx.call_timeout()),
      retries: Some(0),
    };
    let response = tokio::select! {
      biased;
      _ = ctx.cancel().cancelled() => return Err(StepError::Cancelled),
      result = invoker.call(&call.target, &call.operation, request, &options) => {
        result.map_err(|source| StepError::Invoke {
          target: call.target.clone(),
          operation: call.operation.clone(),
          source,
        })?
      }
    };

    if let Some(key) = &call.output_key {
      // A cancelled run must not leave writes behind in its namespace.
      if ctx.cancel().is_cancelled() {
        return Err(StepError::Cancelled);
      }
      ctx
        .store()
        .set(key, response.to_json())
        .await
        .map_err(|source| StepError::Store {
          key: key.clone(),
          source,
        })?;
    }
    Ok(())
  }

  async fn emit(
    &self,
    event: &EventStep,
    ctx: &StepContext,
    request: &Payload,
  ) -> Result<(), StepError> {
    if ctx.cancel().is_cancelled() {
      return Err(StepError::Cancelled);
    }

    match ctx.publisher() {
      Some(publisher) => tokio::select! {
        biased;
        _ = ctx.cancel().cancelled() => Err(StepError::Cancelled),
        result = publisher.publish(&event.topic, request) => {
          result.map_err(|source| StepError::Publish {
            topic: event.topic.clone(),
            source,
          })
        }
      },
      None => {
        debug!(step_id = %self.id, topic = %event.topic, "no publisher configured, event dropped");
        if ctx.logger().enabled(Level::Debug) {
          ctx.logger().log(
            Level::Debug,
            "event dropped",
            &[("run_id", ctx.run_id()), ("topic", event.topic.as_str())],
          );
        }
        Ok(())
      }
    }
  }
}

impl From<StepDef> for Step {
  fn from(def: StepDef) -> Self {
    let step = match def.kind {
      StepKindDef::Invoke {
        target,
        operation,
        timeout_ms,
        output_key,
      } => {
        let mut step = Step::invoke(target, operation);
        if let Some(ms) = timeout_ms {
          step = step.with_timeout(Duration::from_millis(ms));
        }
        if let Some(key) = output_key {
          step = step.with_output_key(key);
        }
        step
      }
      StepKindDef::Publish { topic } => Step::publish(topic),
    };
    let step = match def.id {
      Some(id) => step.with_id(id),
      None => step,
    };
    step.requires_ids(def.requires)
  }
}
