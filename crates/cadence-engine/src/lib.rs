//! Cadence Engine
//!
//! The top-level registry mapping workflow ids to workflows.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Flow                      │
//! │  - create / get / list / remove workflows    │
//! │  - shared Collaborators (invoker, store, ..) │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │                  Workflow                    │
//! │  - step registry + reduced graph (RwLock)    │
//! │  - execute(request, options, cancel)         │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │                    Step                      │
//! │  - invocation → Invoker                      │
//! │  - event      → Publisher                    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cadence_engine::Flow;
//! use cadence_workflow::{Collaborators, ExecuteOptions, Step};
//! use tokio_util::sync::CancellationToken;
//!
//! let flow = Flow::new(Collaborators::default().with_invoker(invoker));
//!
//! let validate = Step::invoke("orders", "validate");
//! let charge = Step::invoke("billing", "charge").require(&[&validate]);
//! flow.create_workflow("orders", vec![validate, charge]).await?;
//!
//! let report = flow
//!   .execute("orders", request, ExecuteOptions::new(), CancellationToken::new())
//!   .await?;
//! ```

mod error;
mod flow;

pub use error::FlowError;
pub use flow::Flow;
