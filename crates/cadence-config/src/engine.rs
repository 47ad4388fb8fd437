use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ConfigError;

/// Engine-wide settings read from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// HTTP invoker used by invocation steps. No invoker when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub invoker: Option<InvokerConfig>,
  /// Per-call timeout for steps without their own.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub call_timeout_ms: Option<u64>,
  /// `tracing` filter directive used when `RUST_LOG` is unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub log_filter: Option<String>,
  /// Minimum level for step-level log lines (`trace` .. `error`).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokerConfig {
  pub base_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(default)]
  pub retries: u32,
}

impl EngineConfig {
  /// `~/.cadence/config.json`, if a home directory exists.
  pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cadence").join("config.json"))
  }

  /// Load from `path`. A missing file yields the defaults.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = match std::fs::read_to_string(path) {
      Ok(text) => text,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => {
        return Err(ConfigError::Io {
          path: path.to_path_buf(),
          source,
        });
      }
    };
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load from the default path, or defaults when there is no home directory.
  pub fn load_default() -> Result<Self, ConfigError> {
    match Self::default_path() {
      Some(path) => Self::load(path),
      None => Ok(Self::default()),
    }
  }

  pub fn call_timeout(&self) -> Option<Duration> {
    self.call_timeout_ms.map(Duration::from_millis)
  }
}

impl InvokerConfig {
  pub fn base_url(&self) -> Result<Url, ConfigError> {
    Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidUrl {
      url: self.base_url.clone(),
      source,
    })
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_ms.map(Duration::from_millis)
  }
}
