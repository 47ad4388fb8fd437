use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDef {
  /// Overrides the id derived from the step kind.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub requires: Vec<String>,
  #[serde(flatten)]
  pub kind: StepKindDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKindDef {
  /// Remote call to `target.operation`.
  Invoke {
    target: String,
    operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    /// Store key receiving the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_key: Option<String>,
  },
  /// Event emission on `topic`.
  Publish { topic: String },
}
