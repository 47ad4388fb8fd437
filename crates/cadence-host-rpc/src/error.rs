use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
  #[error("failed to encode payload: {0}")]
  Encode(#[source] serde_json::Error),

  #[error("failed to decode payload: {0}")]
  Decode(#[source] serde_json::Error),
}

/// Errors returned by invokers and publishers.
#[derive(Debug, Error)]
pub enum InvokeError {
  /// The attempt did not complete in time.
  #[error("call timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  /// HTTP transport failure.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The remote side answered with a non-success status.
  #[error("remote returned status {status}: {body}")]
  Remote { status: u16, body: String },

  /// The endpoint could not be derived from the base URL.
  #[error("invalid endpoint for base url {url}")]
  InvalidEndpoint { url: String },

  /// The delivery channel has no receiver.
  #[error("delivery channel closed")]
  Closed,

  /// Any other failure reported by an implementation.
  #[error("call failed: {message}")]
  Failed { message: String },

  #[error(transparent)]
  Payload(#[from] PayloadError),
}

impl InvokeError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  /// Transport failures and timeouts may succeed on another attempt.
  /// Remote statuses never do.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Timeout { .. } => true,
      Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
      _ => false,
    }
  }
}
