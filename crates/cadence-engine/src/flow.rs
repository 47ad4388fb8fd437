use std::collections::BTreeMap;
use std::sync::Arc;

use cadence_config::{EngineConfig, WorkflowDef};
use cadence_host_log::{Level, TracingLogger, TracingTracer};
use cadence_host_rpc::{HttpInvoker, HttpInvokerConfig, Payload};
use cadence_workflow::{Collaborators, ExecuteOptions, RunReport, Step, Workflow};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::FlowError;

/// Registry of workflows sharing one set of default collaborators.
pub struct Flow {
  defaults: Collaborators,
  workflows: RwLock<BTreeMap<String, Arc<Workflow>>>,
}

impl Flow {
  pub fn new(defaults: Collaborators) -> Self {
    Self {
      defaults,
      workflows: RwLock::new(BTreeMap::new()),
    }
  }

  /// Defaults from the engine configuration file: an HTTP invoker when one
  /// is configured, and `tracing`-backed logger and tracer.
  pub fn from_config(config: &EngineConfig) -> Result<Self, FlowError> {
    let min_level = match config.log_level.as_deref() {
      Some(level) => level.parse::<Level>()?,
      None => Level::Trace,
    };
    let mut defaults = Collaborators::default()
      .with_logger(Arc::new(TracingLogger::new(min_level)))
      .with_tracer(Arc::new(TracingTracer));

    if let Some(invoker) = &config.invoker {
      let http = HttpInvoker::new(HttpInvokerConfig {
        base_url: invoker.base_url()?,
        default_timeout: invoker.timeout(),
        retries: invoker.retries,
      });
      defaults = defaults.with_invoker(Arc::new(http));
    }
    if let Some(timeout) = config.call_timeout() {
      defaults = defaults.with_call_timeout(timeout);
    }

    Ok(Self::new(defaults))
  }

  pub fn defaults(&self) -> &Collaborators {
    &self.defaults
  }

  /// Build, validate, and register a workflow.
  pub async fn create_workflow(
    &self,
    workflow_id: impl Into<String>,
    steps: impl IntoIterator<Item = Step>,
  ) -> Result<Arc<Workflow>, FlowError> {
    let workflow_id = workflow_id.into();
    let mut workflows = self.workflows.write().await;
    if workflows.contains_key(&workflow_id) {
      return Err(FlowError::DuplicateWorkflow { workflow_id });
    }

    let workflow = Arc::new(Workflow::new(
      workflow_id.clone(),
      steps,
      self.defaults.clone(),
    )?);
    workflows.insert(workflow_id.clone(), workflow.clone());
    info!(workflow_id = %workflow_id, steps = workflow.len().await, "workflow created");
    Ok(workflow)
  }

  pub async fn create_from_def(&self, def: WorkflowDef) -> Result<Arc<Workflow>, FlowError> {
    let steps: Vec<Step> = def.steps.into_iter().map(Step::from).collect();
    self.create_workflow(def.workflow_id, steps).await
  }

  pub async fn workflow(&self, workflow_id: &str) -> Option<Arc<Workflow>> {
    self.workflows.read().await.get(workflow_id).cloned()
  }

  /// All workflows, sorted by id.
  pub async fn list_workflows(&self) -> Vec<Arc<Workflow>> {
    self.workflows.read().await.values().cloned().collect()
  }

  /// Unregister a workflow. Runs already holding it are unaffected.
  pub async fn remove_workflow(&self, workflow_id: &str) -> Result<Arc<Workflow>, FlowError> {
    let removed = self.workflows.write().await.remove(workflow_id);
    match removed {
      Some(workflow) => {
        info!(workflow_id = %workflow_id, "workflow removed");
        Ok(workflow)
      }
      None => Err(FlowError::WorkflowNotFound {
        workflow_id: workflow_id.to_string(),
      }),
    }
  }

  /// Look a workflow up and run it.
  pub async fn execute(
    &self,
    workflow_id: &str,
    request: Payload,
    options: ExecuteOptions,
    cancel: CancellationToken,
  ) -> Result<RunReport, FlowError> {
    let workflow = self
      .workflow(workflow_id)
      .await
      .ok_or_else(|| FlowError::WorkflowNotFound {
        workflow_id: workflow_id.to_string(),
      })?;
    Ok(workflow.execute(request, options, cancel).await?)
  }
}

impl std::fmt::Debug for Flow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Flow")
      .field("defaults", &self.defaults)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cadence_config::InvokerConfig;

  #[test]
  fn test_from_config_builds_invoker() {
    let config = EngineConfig {
      invoker: Some(InvokerConfig {
        base_url: "http://localhost:9000".to_string(),
        timeout_ms: Some(100),
        retries: 1,
      }),
      call_timeout_ms: Some(2_000),
      log_filter: None,
      log_level: Some("warn".to_string()),
    };
    let flow = Flow::from_config(&config).unwrap();
    assert!(flow.defaults().invoker.is_some());
    assert_eq!(
      flow.defaults().call_timeout,
      Some(std::time::Duration::from_secs(2))
    );
  }

  #[test]
  fn test_from_config_without_invoker() {
    let flow = Flow::from_config(&EngineConfig::default()).unwrap();
    assert!(flow.defaults().invoker.is_none());
  }

  #[test]
  fn test_from_config_rejects_unknown_log_level() {
    let config = EngineConfig {
      log_level: Some("loud".to_string()),
      ..EngineConfig::default()
    };
    let err = Flow::from_config(&config).unwrap_err();
    assert!(matches!(err, FlowError::LogLevel(_)));
    assert_eq!(
      std::error::Error::source(&err).map(|e| e.to_string()),
      Some("unknown log level: loud".to_string())
    );
  }

  #[test]
  fn test_from_config_rejects_bad_url() {
    let config = EngineConfig {
      invoker: Some(InvokerConfig {
        base_url: "::nope::".to_string(),
        timeout_ms: None,
        retries: 0,
      }),
      ..EngineConfig::default()
    };
    assert!(matches!(
      Flow::from_config(&config),
      Err(FlowError::Config(_))
    ));
  }
}
