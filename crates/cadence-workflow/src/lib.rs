//! Cadence Workflow
//!
//! Steps, workflows, and the execution engine:
//! - [`Step`]: an invocation or event, with the ids of the steps it requires
//! - [`Workflow`]: a step registry plus a validated, reduced dependency graph
//! - [`Workflow::execute`]: runs the graph level by level, concurrently within
//!   a level, stopping at the first failure

mod context;
mod error;
mod execution;
mod options;
mod step;
mod workflow;

pub use cadence_graph::Direction;
pub use context::StepContext;
pub use error::{ExecutionError, StepError, WorkflowError};
pub use execution::RunReport;
pub use options::{Collaborators, ExecuteOptions};
pub use step::{EventStep, InvocationStep, Step, StepKind};
pub use workflow::Workflow;
