use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::format_fields;

/// Starts spans around units of work.
pub trait Tracer: Send + Sync {
  fn start_span(&self, name: &str, attributes: &[(&str, String)]) -> Box<dyn Span>;
}

/// An open span. Must be finished exactly once.
pub trait Span: Send {
  fn add_event(&mut self, name: &str);

  fn set_error(&mut self, error: &str);

  fn finish(self: Box<Self>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl Span for NoopSpan {
  fn add_event(&mut self, _name: &str) {}

  fn set_error(&mut self, _error: &str) {}

  fn finish(self: Box<Self>) {}
}

impl Tracer for NoopTracer {
  fn start_span(&self, _name: &str, _attributes: &[(&str, String)]) -> Box<dyn Span> {
    Box::new(NoopSpan)
  }
}

/// Maps each span onto a `tracing` span and logs its duration on finish.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

struct TracingSpan {
  span: tracing::Span,
  started: Instant,
  error: Option<String>,
}

impl Tracer for TracingTracer {
  fn start_span(&self, name: &str, attributes: &[(&str, String)]) -> Box<dyn Span> {
    let pairs: Vec<(&str, &str)> = attributes.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let span = tracing::info_span!("cadence_span", name = %name, attributes = %format_fields(&pairs));
    Box::new(TracingSpan {
      span,
      started: Instant::now(),
      error: None,
    })
  }
}

impl Span for TracingSpan {
  fn add_event(&mut self, name: &str) {
    tracing::debug!(parent: &self.span, event = %name, "span event");
  }

  fn set_error(&mut self, error: &str) {
    self.error = Some(error.to_string());
  }

  fn finish(self: Box<Self>) {
    let elapsed_ms = self.started.elapsed().as_millis() as u64;
    match &self.error {
      Some(error) => tracing::warn!(parent: &self.span, elapsed_ms, error = %error, "span failed"),
      None => tracing::debug!(parent: &self.span, elapsed_ms, "span finished"),
    }
  }
}

/// A finished span captured by [`InMemoryTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
  pub name: String,
  pub attributes: Vec<(String, String)>,
  pub events: Vec<String>,
  pub error: Option<String>,
}

impl SpanRecord {
  pub fn attribute(&self, key: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }
}

/// Records finished spans, in finish order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracer {
  finished: Arc<Mutex<Vec<SpanRecord>>>,
}

impl InMemoryTracer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn finished(&self) -> Vec<SpanRecord> {
    self
      .finished
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

struct InMemorySpan {
  record: SpanRecord,
  sink: Arc<Mutex<Vec<SpanRecord>>>,
}

impl Tracer for InMemoryTracer {
  fn start_span(&self, name: &str, attributes: &[(&str, String)]) -> Box<dyn Span> {
    Box::new(InMemorySpan {
      record: SpanRecord {
        name: name.to_string(),
        attributes: attributes
          .iter()
          .map(|(k, v)| (k.to_string(), v.clone()))
          .collect(),
        events: Vec::new(),
        error: None,
      },
      sink: self.finished.clone(),
    })
  }
}

impl Span for InMemorySpan {
  fn add_event(&mut self, name: &str) {
    self.record.events.push(name.to_string());
  }

  fn set_error(&mut self, error: &str) {
    self.record.error = Some(error.to_string());
  }

  fn finish(self: Box<Self>) {
    let InMemorySpan { record, sink } = *self;
    sink
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(record);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_in_memory_tracer_records_on_finish() {
    let tracer = InMemoryTracer::new();
    let mut span = tracer.start_span("step", &[("step_id", "fetch".to_string())]);
    assert!(tracer.finished().is_empty());

    span.add_event("started");
    span.set_error("boom");
    span.finish();

    let spans = tracer.finished();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "step");
    assert_eq!(spans[0].attribute("step_id"), Some("fetch"));
    assert_eq!(spans[0].events, vec!["started"]);
    assert_eq!(spans[0].error.as_deref(), Some("boom"));
  }

  #[test]
  fn test_clones_share_records() {
    let tracer = InMemoryTracer::new();
    let shared = tracer.clone();
    shared.start_span("run", &[]).finish();
    assert_eq!(tracer.finished().len(), 1);
  }

  #[test]
  fn test_tracing_tracer_without_subscriber() {
    let mut span = TracingTracer.start_span("run", &[("run_id", "r1".to_string())]);
    span.add_event("level");
    span.finish();
  }
}
