//! Workflow: a step registry plus the reduced dependency graph built from it.

use std::collections::HashMap;
use std::sync::Arc;

use cadence_graph::{Direction, Graph};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::error::WorkflowError;
use crate::options::Collaborators;
use crate::step::Step;

/// A named set of steps and the DAG of their `requires` relations.
///
/// Reads (`steps`, `levels`, `execute`) share the lock; `append_steps` and
/// `remove_steps` take it exclusively and wait for in-flight runs. A step must
/// not mutate its own workflow while running.
pub struct Workflow {
  id: String,
  defaults: Collaborators,
  state: RwLock<State>,
}

pub(crate) struct State {
  steps: HashMap<String, Arc<Step>>,
  graph: Graph,
  initialized: bool,
}

impl State {
  /// Graph over `steps`, validated and transitively reduced.
  fn build(steps: &HashMap<String, Arc<Step>>) -> Result<Graph, WorkflowError> {
    let mut graph = Graph::new();
    for id in steps.keys() {
      graph.add_node(id.clone());
    }

    let mut entries: Vec<(&String, &Arc<Step>)> = steps.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (id, step) in entries {
      for dependency in step.requires() {
        if !steps.contains_key(dependency) {
          return Err(WorkflowError::MissingDependency {
            step_id: id.clone(),
            dependency: dependency.clone(),
          });
        }
        graph.connect(dependency, id)?;
      }
    }

    graph.validate()?;
    graph.transitive_reduction();
    Ok(graph)
  }

  fn rebuild(&mut self) -> Result<(), WorkflowError> {
    self.graph = Self::build(&self.steps)?;
    self.initialized = true;
    Ok(())
  }

  pub(crate) fn levels(
    &self,
    start: Option<&str>,
    direction: Direction,
  ) -> Result<Vec<Vec<Arc<Step>>>, WorkflowError> {
    let levels = self.graph.levels(start, direction)?;
    Ok(
      levels
        .into_iter()
        .map(|level| {
          level
            .iter()
            .filter_map(|id| self.steps.get(id).cloned())
            .collect()
        })
        .collect(),
    )
  }
}

fn register(workflow_id: &str, steps: &mut HashMap<String, Arc<Step>>, step: Step) {
  let step_id = step.id().to_string();
  if steps.insert(step_id.clone(), Arc::new(step)).is_some() {
    warn!(
      workflow_id = %workflow_id,
      step_id = %step_id,
      "step id already registered, replacing earlier step"
    );
  }
}

impl Workflow {
  /// Build a workflow and validate its graph.
  pub fn new(
    id: impl Into<String>,
    steps: impl IntoIterator<Item = Step>,
    defaults: Collaborators,
  ) -> Result<Self, WorkflowError> {
    let id = id.into();
    let mut registry = HashMap::new();
    for step in steps {
      register(&id, &mut registry, step);
    }
    let graph = State::build(&registry)?;

    Ok(Self {
      id,
      defaults,
      state: RwLock::new(State {
        steps: registry,
        graph,
        initialized: true,
      }),
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn defaults(&self) -> &Collaborators {
    &self.defaults
  }

  /// Register more steps. All or nothing: on any structural error the
  /// workflow is left exactly as it was.
  pub async fn append_steps(
    &self,
    steps: impl IntoIterator<Item = Step>,
  ) -> Result<(), WorkflowError> {
    let mut state = self.state.write().await;

    let mut candidate = state.steps.clone();
    for step in steps {
      register(&self.id, &mut candidate, step);
    }
    let graph = State::build(&candidate)?;

    state.steps = candidate;
    state.graph = graph;
    state.initialized = true;
    debug!(workflow_id = %self.id, steps = state.steps.len(), "steps appended");
    Ok(())
  }

  /// Unregister steps by id.
  ///
  /// Steps that still require a removed step are not checked here; the
  /// dangling reference surfaces as `MissingDependency` on the next
  /// validation, level computation, or run.
  pub async fn remove_steps<I, S>(&self, ids: I) -> Result<(), WorkflowError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let ids: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
    let mut state = self.state.write().await;

    if let Some(missing) = ids.iter().find(|id| !state.steps.contains_key(*id)) {
      return Err(WorkflowError::StepNotFound {
        step_id: missing.clone(),
      });
    }

    for id in &ids {
      state.steps.remove(id);
      state.graph.remove_node(id);
    }
    state.initialized = false;
    debug!(workflow_id = %self.id, removed = ids.len(), "steps removed");
    Ok(())
  }

  /// Rebuild, validate, and reduce the graph from the registry.
  pub async fn validate(&self) -> Result<(), WorkflowError> {
    self.state.write().await.rebuild()
  }

  /// Levels from the root, forward.
  pub async fn steps(&self) -> Result<Vec<Vec<Arc<Step>>>, WorkflowError> {
    self.levels(None, Direction::Forward).await
  }

  /// Groups of steps that can run together, in dependency order.
  pub async fn levels(
    &self,
    start: Option<&str>,
    direction: Direction,
  ) -> Result<Vec<Vec<Arc<Step>>>, WorkflowError> {
    self.read_initialized().await?.levels(start, direction)
  }

  pub async fn step(&self, id: &str) -> Option<Arc<Step>> {
    self.state.read().await.steps.get(id).cloned()
  }

  /// Registered step ids, sorted.
  pub async fn step_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.state.read().await.steps.keys().cloned().collect();
    ids.sort();
    ids
  }

  pub async fn len(&self) -> usize {
    self.state.read().await.steps.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.state.read().await.steps.is_empty()
  }

  /// Shared access to a validated state, validating first if a mutation
  /// left it uninitialized.
  pub(crate) async fn read_initialized(
    &self,
  ) -> Result<RwLockReadGuard<'_, State>, WorkflowError> {
    {
      let state = self.state.read().await;
      if state.initialized {
        return Ok(state);
      }
    }

    let mut state = self.state.write().await;
    if !state.initialized {
      debug!(workflow_id = %self.id, "validating workflow");
      state.rebuild()?;
    }
    Ok(state.downgrade())
  }
}

impl std::fmt::Debug for Workflow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Workflow")
      .field("id", &self.id)
      .finish_non_exhaustive()
  }
}
