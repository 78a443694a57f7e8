// Flowdeck — Schema-driven workflow input forms and execution console
// License: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("home directory not found")]
    NoHomeDir,
    #[error("backend endpoint is invalid: {0}")]
    InvalidEndpoint(String),
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// JSON-RPC endpoint of the workflow backend.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Method namespace; calls go out as `<extension>.<operation>`.
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            extension: default_extension(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080/q/dev-ui/json-rpc".to_string()
}
fn default_extension() -> String {
    "quarkus-flow".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> usize {
    2
}
fn default_retry_delay_ms() -> u64 {
    500
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Upper bound on a single workflow execution. `0` waits forever.
    #[serde(default = "default_execution_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_execution_timeout_secs(),
        }
    }
}

fn default_execution_timeout_secs() -> u64 {
    300
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a JSON file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (prefix: FLOWDECK_)
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FLOWDECK_BACKEND_ENDPOINT") {
            self.backend.endpoint = v;
        }
        if let Ok(v) = std::env::var("FLOWDECK_BACKEND_EXTENSION") {
            self.backend.extension = v;
        }
        if let Ok(v) = std::env::var("FLOWDECK_BACKEND_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.backend.timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("FLOWDECK_BACKEND_MAX_RETRIES") {
            if let Ok(n) = v.parse() {
                self.backend.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("FLOWDECK_EXECUTION_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.execution.timeout_secs = n;
            }
        }
    }

    /// Get the default config file path: ~/.flowdeck/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".flowdeck").join("config.json"))
    }

    /// Validate configuration for basic correctness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&self.backend.endpoint)
            .map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {}", self.backend.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }

        if self.backend.extension.trim().is_empty() {
            return Err(ConfigError::Other(
                "backend.extension must name the JSON-RPC method namespace".to_string(),
            ));
        }

        if self.backend.timeout_secs == 0 {
            tracing::warn!("backend.timeout_secs is 0, HTTP requests will not time out");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
