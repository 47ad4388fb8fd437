use cadence_config::ConfigError;
use cadence_host_log::ParseLevelError;
use cadence_workflow::{ExecutionError, WorkflowError};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
  #[error("workflow '{workflow_id}' already exists")]
  DuplicateWorkflow { workflow_id: String },

  #[error("workflow '{workflow_id}' not found")]
  WorkflowNotFound { workflow_id: String },

  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[error(transparent)]
  Execution(#[from] ExecutionError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("invalid log_level in engine config")]
  LogLevel(#[from] ParseLevelError),
}
