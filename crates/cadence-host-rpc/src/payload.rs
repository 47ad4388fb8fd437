use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PayloadError;

/// A JSON document passed to and returned from steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
  pub fn new(value: Value) -> Self {
    Self(value)
  }

  /// The payload carried by a response with no body.
  pub fn empty() -> Self {
    Self(Value::Null)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_null()
  }

  pub fn encode<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
    serde_json::to_value(value)
      .map(Self)
      .map_err(PayloadError::Encode)
  }

  pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
    T::deserialize(&self.0).map_err(PayloadError::Decode)
  }

  pub fn from_json(text: &str) -> Result<Self, PayloadError> {
    serde_json::from_str(text)
      .map(Self)
      .map_err(PayloadError::Decode)
  }

  pub fn to_json(&self) -> String {
    self.0.to_string()
  }

  pub fn as_value(&self) -> &Value {
    &self.0
  }
}

impl From<Value> for Payload {
  fn from(value: Value) -> Self {
    Self(value)
  }
}
