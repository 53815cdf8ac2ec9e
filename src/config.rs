use serde::Deserialize;
use std::{fs, path::Path};

use crate::pipeline::ExportError;

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabConfig {
    pub base_url: String,
    pub project_id: String,
    pub private_token: String,
    pub source_path: String,
    pub upload_path: String,
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub chunk_size: usize,
    pub lookback_minutes: i64,
    /// When absent, the window end equals its start (single-instant query).
    #[serde(default)]
    pub end_lookback_minutes: Option<i64>,
    #[serde(default = "default_round_minutes")]
    pub round_minutes: i64,
    #[serde(default = "default_point_column")]
    pub point_column: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Skip batches whose query fails instead of aborting the whole run.
    #[serde(default)]
    pub allow_partial_batches: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub gitlab: GitLabConfig,
    pub data_api: DataApiConfig,
    pub query: QueryConfig,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ExportError::InvalidConfiguration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let cfg: AppConfig = toml::from_str(&contents).map_err(|e| {
            ExportError::InvalidConfiguration(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Runs before any network activity.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.query.chunk_size == 0 {
            return Err(ExportError::InvalidConfiguration(
                "query.chunk_size must be positive".to_string(),
            ));
        }
        if self.query.lookback_minutes < 0 {
            return Err(ExportError::InvalidConfiguration(
                "query.lookback_minutes must be non-negative".to_string(),
            ));
        }
        if self.query.round_minutes <= 0 {
            return Err(ExportError::InvalidConfiguration(
                "query.round_minutes must be positive".to_string(),
            ));
        }
        if let Some(end) = self.query.end_lookback_minutes {
            if end < 0 {
                return Err(ExportError::InvalidConfiguration(
                    "query.end_lookback_minutes must be non-negative".to_string(),
                ));
            }
        }
        self.target_timezone()?;
        Ok(())
    }

    pub fn target_timezone(&self) -> Result<chrono_tz::Tz, ExportError> {
        self.query.timezone.parse().map_err(|_| {
            ExportError::InvalidConfiguration(format!(
                "unknown timezone '{}' in query.timezone",
                self.query.timezone
            ))
        })
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_round_minutes() -> i64 {
    5
}

fn default_point_column() -> String {
    "FromMwAnalogPointRef".to_string()
}

fn default_timezone() -> String {
    "Europe/Tallinn".to_string()
}

fn default_max_concurrent_requests() -> usize {
    1
}

fn default_ssl_verify() -> bool {
    true
}
