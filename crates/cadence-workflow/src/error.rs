//! Workflow, step, and run errors.

use cadence_graph::GraphError;
use cadence_host_kv::KvError;
use cadence_host_rpc::InvokeError;

/// Structural errors raised while building or mutating a workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
  /// Cycle, unknown node, or missing/ambiguous root.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// A `requires` entry names a step that is not registered.
  #[error("step '{step_id}' requires unknown step '{dependency}'")]
  MissingDependency { step_id: String, dependency: String },

  #[error("step '{step_id}' not found in workflow")]
  StepNotFound { step_id: String },
}

/// Errors returned by a single step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
  #[error("step '{step_id}' needs an invoker but none is configured")]
  MissingInvoker { step_id: String },

  #[error("invocation of {target}.{operation} failed")]
  Invoke {
    target: String,
    operation: String,
    #[source]
    source: InvokeError,
  },

  #[error("publish to '{topic}' failed")]
  Publish {
    topic: String,
    #[source]
    source: InvokeError,
  },

  #[error("failed to write '{key}' to the run store")]
  Store {
    key: String,
    #[source]
    source: KvError,
  },

  /// The run was cancelled before the step started its work.
  #[error("step cancelled")]
  Cancelled,

  #[error("step panicked: {message}")]
  Panicked { message: String },
}

/// Errors returned by [`Workflow::execute`](crate::Workflow::execute).
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
  /// The workflow failed validation before a run id was assigned.
  #[error(transparent)]
  Structure(#[from] WorkflowError),

  /// A required collaborator is missing. Nothing ran.
  #[error("run {run_id}: {message}")]
  Configuration { run_id: String, message: String },

  #[error("run {run_id}: step '{step_id}' failed")]
  StepFailed {
    run_id: String,
    step_id: String,
    #[source]
    source: StepError,
  },

  /// The caller's token was cancelled.
  #[error("run {run_id} cancelled")]
  Cancelled { run_id: String },

  #[error("run {run_id} exceeded its deadline")]
  DeadlineExceeded { run_id: String },
}

impl ExecutionError {
  /// The run this error belongs to, so partial store writes can be inspected.
  pub fn run_id(&self) -> Option<&str> {
    match self {
      Self::Structure(_) => None,
      Self::Configuration { run_id, .. }
      | Self::StepFailed { run_id, .. }
      | Self::Cancelled { run_id }
      | Self::DeadlineExceeded { run_id } => Some(run_id),
    }
  }
}
