//! Runtime configuration
//!
//! One `DriftConfig` document (JSON, YAML, or TOML, chosen by file
//! extension) with a section per subsystem. Every section and every field
//! is optional; omitted ones fall back to a conservative default profile.
//! The API token is deliberately not part of the file: it is read from
//! the `SPEC_DRIFT_API_TOKEN` environment variable only, so config files
//! stay safe to commit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DriftError, Result};
use crate::limiter::RateLimitConfig;
use crate::reconciler::ReconciliationConfig;
use crate::report::ReportConfig;

/// Environment variable the API token is read from.
pub const TOKEN_ENV_VAR: &str = "SPEC_DRIFT_API_TOKEN";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub api: ApiConfig,
    pub rate_limit: RateLimitSettings,
    pub specs: SpecsConfig,
    /// Probe targets, keyed by a free-form endpoint name.
    pub endpoints: BTreeMap<String, EndpointTarget>,
    pub reconciliation: ReconciliationConfig,
    pub reports: ReportConfig,
}

impl DriftConfig {
    /// Load a configuration file, dispatching the parser on extension.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DriftError::file_error(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "json" => Ok(serde_json::from_str(content)?),
            "yaml" | "yml" => Ok(serde_yaml::from_str(content)?),
            "toml" => {
                // TOML goes through a JSON round-trip so all three
                // formats share one deserialization path.
                let value: toml::Value = toml::from_str(content)?;
                let json = serde_json::to_string(&value)?;
                Ok(serde_json::from_str(&json)?)
            }
            other => Err(DriftError::invalid_input(format!(
                "Unsupported file format: {}. Supported formats: json, yaml, yml, toml",
                other
            ))),
        }
    }

    /// Read the API token from the environment.
    pub fn api_token() -> Result<String> {
        std::env::var(TOKEN_ENV_VAR).map_err(|_| {
            DriftError::invalid_input(format!("{} environment variable not set", TOKEN_ENV_VAR))
        })
    }
}

/// Target API connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL probes are issued against.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Attempt budget shared by rate-limit and transport retries.
    pub max_retries: u32,
    /// Values substituted into `{param}` placeholders in endpoint paths.
    pub path_params: BTreeMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 30_000,
            max_retries: 3,
            path_params: BTreeMap::new(),
        }
    }
}

/// File-facing rate limiter tuning; durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub requests_per_minute: u32,
    pub min_request_interval_ms: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub adaptive: bool,
    pub decrease_factor: f64,
    pub increase_factor: f64,
    pub success_streak_threshold: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            min_request_interval_ms: 500,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            adaptive: true,
            decrease_factor: 0.8,
            increase_factor: 1.1,
            success_streak_threshold: 50,
        }
    }
}

impl RateLimitSettings {
    pub fn to_limiter_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: self.requests_per_minute,
            min_request_interval: Duration::from_millis(self.min_request_interval_ms),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            adaptive: self.adaptive,
            decrease_factor: self.decrease_factor,
            increase_factor: self.increase_factor,
            success_streak_threshold: self.success_streak_threshold,
        }
    }
}

/// Spec directory layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecsConfig {
    /// Directory holding the untouched upstream spec files.
    pub original_dir: PathBuf,
    /// Directory reconciled specs are written to.
    pub output_dir: PathBuf,
}

impl Default for SpecsConfig {
    fn default() -> Self {
        Self {
            original_dir: PathBuf::from("specs/original"),
            output_dir: PathBuf::from("specs/reconciled"),
        }
    }
}

/// One probe target: which schema to exercise against which endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointTarget {
    /// Resource name, matched by `--endpoint` substring filters.
    pub resource: String,
    /// Spec file (within the originals dir) the schema lives in.
    pub domain_file: String,
    /// Schema name under `components/schemas` to generate probes from.
    pub schema: String,
    /// POST path for create probes; `{param}` placeholders allowed.
    pub create_path: String,
    /// Baseline request body probe values are overlaid onto.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_template: Option<Value>,
}
