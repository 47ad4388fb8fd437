use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Counter and histogram sink.
pub trait Meter: Send + Sync {
  fn counter(&self, name: &str, labels: &[(&str, &str)], value: u64);

  fn histogram(&self, name: &str, labels: &[(&str, &str)], value: f64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
  fn counter(&self, _name: &str, _labels: &[(&str, &str)], _value: u64) {}

  fn histogram(&self, _name: &str, _labels: &[(&str, &str)], _value: f64) {}
}

/// Aggregates counters and keeps raw histogram observations.
///
/// Series are keyed by name plus labels sorted by key, so label order at the
/// call site does not matter.
#[derive(Debug, Default)]
pub struct InMemoryMeter {
  counters: Mutex<BTreeMap<String, u64>>,
  histograms: Mutex<BTreeMap<String, Vec<f64>>>,
}

impl InMemoryMeter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
    self
      .counters
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&series_key(name, labels))
      .copied()
      .unwrap_or(0)
  }

  pub fn observations(&self, name: &str, labels: &[(&str, &str)]) -> Vec<f64> {
    self
      .histograms
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&series_key(name, labels))
      .cloned()
      .unwrap_or_default()
  }
}

impl Meter for InMemoryMeter {
  fn counter(&self, name: &str, labels: &[(&str, &str)], value: u64) {
    let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
    *counters.entry(series_key(name, labels)).or_insert(0) += value;
  }

  fn histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
    self
      .histograms
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(series_key(name, labels))
      .or_default()
      .push(value);
  }
}

fn series_key(name: &str, labels: &[(&str, &str)]) -> String {
  if labels.is_empty() {
    return name.to_string();
  }
  let mut sorted = labels.to_vec();
  sorted.sort();
  let rendered = sorted
    .iter()
    .map(|(k, v)| format!("{}=\"{}\"", k, v))
    .collect::<Vec<_>>()
    .join(",");
  format!("{}{{{}}}", name, rendered)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_counters_accumulate_per_series() {
    let meter = InMemoryMeter::new();
    meter.counter("steps", &[("outcome", "ok"), ("kind", "invoke")], 1);
    meter.counter("steps", &[("kind", "invoke"), ("outcome", "ok")], 2);
    meter.counter("steps", &[("outcome", "failed"), ("kind", "invoke")], 1);

    assert_eq!(meter.counter_value("steps", &[("kind", "invoke"), ("outcome", "ok")]), 3);
    assert_eq!(meter.counter_value("steps", &[("kind", "invoke"), ("outcome", "failed")]), 1);
    assert_eq!(meter.counter_value("steps", &[]), 0);
  }

  #[test]
  fn test_histogram_observations() {
    let meter = InMemoryMeter::new();
    meter.histogram("run_ms", &[], 1.5);
    meter.histogram("run_ms", &[], 2.5);
    assert_eq!(meter.observations("run_ms", &[]), vec![1.5, 2.5]);
    assert!(meter.observations("missing", &[]).is_empty());
  }

  #[test]
  fn test_series_key_format() {
    assert_eq!(series_key("runs", &[]), "runs");
    assert_eq!(
      series_key("runs", &[("b", "2"), ("a", "1")]),
      "runs{a=\"1\",b=\"2\"}"
    );
  }
}
