//! Observability capabilities for cadence.
//!
//! The engine is handed a [`Logger`], a [`Tracer`], and a [`Meter`] as
//! explicit collaborators. Each has a no-op implementation used whenever the
//! caller does not supply one, a `tracing`-backed or in-memory implementation
//! for real use and for tests. None of them can influence control flow.

mod logger;
mod meter;
mod tracer;

pub use logger::{InMemoryLogger, Level, LogRecord, Logger, NoopLogger, ParseLevelError, TracingLogger};
pub use meter::{InMemoryMeter, Meter, NoopMeter};
pub use tracer::{InMemoryTracer, NoopTracer, Span, SpanRecord, Tracer, TracingTracer};

/// Render `key=value` pairs the same way across all implementations.
pub(crate) fn format_fields(fields: &[(&str, &str)]) -> String {
  fields
    .iter()
    .map(|(k, v)| format!("{}={}", k, v))
    .collect::<Vec<_>>()
    .join(" ")
}
