//! Workflow execution.

use std::sync::Arc;
use std::time::Instant;

use cadence_host_log::Level;
use cadence_host_rpc::Payload;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::context::StepContext;
use crate::error::{ExecutionError, StepError};
use crate::options::ExecuteOptions;
use crate::step::Step;
use crate::workflow::Workflow;

const RUNS_TOTAL: &str = "cadence_runs_total";
const STEPS_TOTAL: &str = "cadence_steps_total";
const STEP_DURATION: &str = "cadence_step_duration_seconds";

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
  /// Unique run id. Also the namespace of the run's store writes.
  pub run_id: String,
  /// Number of levels executed.
  pub levels: usize,
  /// Completed step ids, level by level, in completion order.
  pub completed: Vec<String>,
}

impl Workflow {
  /// Run the workflow once.
  ///
  /// Levels run in order, with every step of a level spawned concurrently and
  /// joined before the next level starts. The first step failure cancels the
  /// run: the current level is drained and no later level is launched.
  /// Cancelling `cancel`, or reaching `options.deadline`, returns immediately
  /// without waiting for steps already in flight.
  #[instrument(
    name = "workflow_execute",
    skip(self, request, options, cancel),
    fields(workflow_id = %self.id())
  )]
  pub async fn execute(
    &self,
    request: Payload,
    options: ExecuteOptions,
    cancel: CancellationToken,
  ) -> Result<RunReport, ExecutionError> {
    let deadline = options.deadline.map(|d| tokio::time::Instant::now() + d);
    // Held for the whole run so structural mutations wait for it.
    let state = self.read_initialized().await?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let run_cancel = cancel.child_token();
    let collaborators = options.merge(self.defaults());
    let ctx = StepContext::new(&run_id, self.id(), &collaborators, run_cancel);

    let levels = state.levels(options.start.as_deref(), options.direction)?;

    if ctx.invoker().is_none() {
      if let Some(step) = levels.iter().flatten().find(|s| s.is_invocation()) {
        let err = ExecutionError::Configuration {
          run_id,
          message: format!("step '{}' needs an invoker but none is configured", step.id()),
        };
        error!(error = %err, "workflow_failed");
        ctx.meter().counter(
          RUNS_TOTAL,
          &[("workflow", self.id()), ("status", "misconfigured")],
          1,
        );
        return Err(err);
      }
    }

    info!(
      run_id = %run_id,
      workflow_id = %self.id(),
      levels = levels.len(),
      "workflow_started"
    );
    let mut span = ctx.tracer().start_span(
      "workflow.run",
      &[
        ("run_id", run_id.clone()),
        ("workflow_id", self.id().to_string()),
      ],
    );

    let result = run_levels(&ctx, &levels, request, &cancel, deadline).await;

    let status = match &result {
      Ok(completed) => {
        info!(run_id = %run_id, completed = completed.len(), "workflow_completed");
        "completed"
      }
      Err(e) => {
        error!(run_id = %run_id, error = %e, "workflow_failed");
        span.set_error(&e.to_string());
        match e {
          ExecutionError::Cancelled { .. } => "cancelled",
          ExecutionError::DeadlineExceeded { .. } => "deadline_exceeded",
          _ => "failed",
        }
      }
    };
    span.finish();
    ctx
      .meter()
      .counter(RUNS_TOTAL, &[("workflow", self.id()), ("status", status)], 1);

    result.map(|completed| RunReport {
      run_id,
      levels: levels.len(),
      completed,
    })
  }
}

async fn run_levels(
  ctx: &StepContext,
  levels: &[Vec<Arc<Step>>],
  request: Payload,
  caller: &CancellationToken,
  deadline: Option<tokio::time::Instant>,
) -> Result<Vec<String>, ExecutionError> {
  let run_id = ctx.run_id().to_string();
  // Capacity one: the first failure is kept, later ones are dropped.
  let (failure_tx, mut failure_rx) = mpsc::channel::<(String, StepError)>(1);
  let (done_tx, mut done_rx) = mpsc::unbounded_channel::<String>();
  let mut completed = Vec::new();

  let expiry = async {
    match deadline {
      Some(at) => tokio::time::sleep_until(at).await,
      None => std::future::pending().await,
    }
  };
  tokio::pin!(expiry);

  for (index, level) in levels.iter().enumerate() {
    if ctx.cancel().is_cancelled() {
      break;
    }
    let level_label = index.to_string();

    let handles: Vec<_> = level
      .iter()
      .map(|step| {
        if ctx.logger().enabled(Level::Trace) {
          ctx.logger().log(
            Level::Trace,
            "step scheduled",
            &[
              ("run_id", run_id.as_str()),
              ("step_id", step.id()),
              ("level", level_label.as_str()),
            ],
          );
        }
        spawn_step(
          step.clone(),
          ctx.clone(),
          request.clone(),
          failure_tx.clone(),
          done_tx.clone(),
        )
      })
      .collect();

    let results = tokio::select! {
      biased;
      _ = caller.cancelled() => {
        warn!(run_id = %run_id, level = index, "workflow cancelled by caller");
        return Err(ExecutionError::Cancelled { run_id });
      }
      _ = &mut expiry => {
        ctx.cancel().cancel();
        warn!(run_id = %run_id, level = index, "workflow deadline exceeded");
        return Err(ExecutionError::DeadlineExceeded { run_id });
      }
      results = futures::future::join_all(handles) => results,
    };

    for (step, joined) in level.iter().zip(results) {
      if let Err(e) = joined {
        let message = if e.is_panic() {
          "task panicked".to_string()
        } else {
          e.to_string()
        };
        let _ = failure_tx.try_send((step.id().to_string(), StepError::Panicked { message }));
        ctx.cancel().cancel();
      }
    }

    while let Ok(step_id) = done_rx.try_recv() {
      completed.push(step_id);
    }

    if let Ok((step_id, source)) = failure_rx.try_recv() {
      return Err(ExecutionError::StepFailed {
        run_id,
        step_id,
        source,
      });
    }
  }

  if caller.is_cancelled() {
    return Err(ExecutionError::Cancelled { run_id });
  }
  Ok(completed)
}

fn spawn_step(
  step: Arc<Step>,
  ctx: StepContext,
  request: Payload,
  failures: mpsc::Sender<(String, StepError)>,
  done: mpsc::UnboundedSender<String>,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let started = Instant::now();
    let mut span = ctx.tracer().start_span(
      "step.execute",
      &[
        ("run_id", ctx.run_id().to_string()),
        ("step_id", step.id().to_string()),
      ],
    );

    let result = step.execute(&ctx, &request).await;

    ctx.meter().histogram(
      STEP_DURATION,
      &[("workflow", ctx.workflow_id())],
      started.elapsed().as_secs_f64(),
    );

    match result {
      Ok(()) => {
        span.finish();
        ctx.meter().counter(
          STEPS_TOTAL,
          &[("workflow", ctx.workflow_id()), ("status", "completed")],
          1,
        );
        let _ = done.send(step.id().to_string());
      }
      Err(StepError::Cancelled) => {
        debug!(run_id = %ctx.run_id(), step_id = %step.id(), "step_cancelled");
        span.set_error("cancelled");
        span.finish();
        ctx.meter().counter(
          STEPS_TOTAL,
          &[("workflow", ctx.workflow_id()), ("status", "cancelled")],
          1,
        );
      }
      Err(e) => {
        error!(run_id = %ctx.run_id(), step_id = %step.id(), error = %e, "step_failed");
        span.set_error(&e.to_string());
        span.finish();
        ctx.meter().counter(
          STEPS_TOTAL,
          &[("workflow", ctx.workflow_id()), ("status", "failed")],
          1,
        );
        let _ = failures.try_send((step.id().to_string(), e));
        ctx.cancel().cancel();
      }
    }
  })
}
