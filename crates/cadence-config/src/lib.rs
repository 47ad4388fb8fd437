//! Cadence Config
//!
//! Serializable types read from disk before anything runs:
//! - workflow definitions (`WorkflowDef`), turned into steps by the engine
//! - the engine configuration file (`EngineConfig`), defaulting to
//!   `~/.cadence/config.json`

mod engine;
mod error;
mod step;
mod workflow;

pub use engine::{EngineConfig, InvokerConfig};
pub use error::ConfigError;
pub use step::{StepDef, StepKindDef};
pub use workflow::WorkflowDef;
