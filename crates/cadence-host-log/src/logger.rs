use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use crate::format_fields;

/// Log severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
  Trace,
  Debug,
  Info,
  Warn,
  Error,
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Level::Trace => "trace",
      Level::Debug => "debug",
      Level::Info => "info",
      Level::Warn => "warn",
      Level::Error => "error",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(String);

impl FromStr for Level {
  type Err = ParseLevelError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "trace" => Ok(Level::Trace),
      "debug" => Ok(Level::Debug),
      "info" => Ok(Level::Info),
      "warn" | "warning" => Ok(Level::Warn),
      "error" => Ok(Level::Error),
      other => Err(ParseLevelError(other.to_string())),
    }
  }
}

/// Level-gated log sink.
///
/// Callers check [`Logger::enabled`] before building expensive messages.
pub trait Logger: Send + Sync {
  fn enabled(&self, level: Level) -> bool;

  fn log(&self, level: Level, message: &str, fields: &[(&str, &str)]);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
  fn enabled(&self, _level: Level) -> bool {
    false
  }

  fn log(&self, _level: Level, _message: &str, _fields: &[(&str, &str)]) {}
}

/// Forwards to the `tracing` macros at the matching level.
///
/// A level is enabled when it is at or above `min_level` and the installed
/// subscriber is interested in it.
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
  min_level: Level,
}

impl TracingLogger {
  pub fn new(min_level: Level) -> Self {
    Self { min_level }
  }
}

impl Default for TracingLogger {
  fn default() -> Self {
    Self::new(Level::Trace)
  }
}

impl Logger for TracingLogger {
  fn enabled(&self, level: Level) -> bool {
    if level < self.min_level {
      return false;
    }
    match level {
      Level::Trace => tracing::enabled!(tracing::Level::TRACE),
      Level::Debug => tracing::enabled!(tracing::Level::DEBUG),
      Level::Info => tracing::enabled!(tracing::Level::INFO),
      Level::Warn => tracing::enabled!(tracing::Level::WARN),
      Level::Error => tracing::enabled!(tracing::Level::ERROR),
    }
  }

  fn log(&self, level: Level, message: &str, fields: &[(&str, &str)]) {
    if !self.enabled(level) {
      return;
    }
    let fields = format_fields(fields);
    match level {
      Level::Trace => tracing::trace!(fields = %fields, "{}", message),
      Level::Debug => tracing::debug!(fields = %fields, "{}", message),
      Level::Info => tracing::info!(fields = %fields, "{}", message),
      Level::Warn => tracing::warn!(fields = %fields, "{}", message),
      Level::Error => tracing::error!(fields = %fields, "{}", message),
    }
  }
}

/// A captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
  pub level: Level,
  pub message: String,
  pub fields: String,
}

/// Keeps every line at or above `min_level` in memory.
#[derive(Debug)]
pub struct InMemoryLogger {
  min_level: Level,
  records: Mutex<Vec<LogRecord>>,
}

impl InMemoryLogger {
  pub fn new(min_level: Level) -> Self {
    Self {
      min_level,
      records: Mutex::new(Vec::new()),
    }
  }

  pub fn records(&self) -> Vec<LogRecord> {
    self
      .records
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

impl Logger for InMemoryLogger {
  fn enabled(&self, level: Level) -> bool {
    level >= self.min_level
  }

  fn log(&self, level: Level, message: &str, fields: &[(&str, &str)]) {
    if !self.enabled(level) {
      return;
    }
    self
      .records
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(LogRecord {
        level,
        message: message.to_string(),
        fields: format_fields(fields),
      });
  }
}
