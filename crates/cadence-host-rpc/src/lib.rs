//! Remote-call and event-emission capabilities for cadence steps.

mod channel;
mod error;
mod http;
mod payload;

use std::time::Duration;

use async_trait::async_trait;

pub use channel::{ChannelPublisher, Message};
pub use error::{InvokeError, PayloadError};
pub use http::{HttpInvoker, HttpInvokerConfig};
pub use payload::Payload;

/// Per-call options passed to an [`Invoker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
  /// Upper bound on a single attempt.
  pub timeout: Option<Duration>,
  /// Extra attempts after a retryable failure. `Some(0)` turns retries off;
  /// `None` leaves the choice to the invoker.
  pub retries: Option<u32>,
}

/// Performs a remote call to `target.operation`.
#[async_trait]
pub trait Invoker: Send + Sync {
  async fn call(
    &self,
    target: &str,
    operation: &str,
    payload: &Payload,
    options: &CallOptions,
  ) -> Result<Payload, InvokeError>;
}

/// Emits an event on a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
  async fn publish(&self, topic: &str, payload: &Payload) -> Result<(), InvokeError>;
}
