//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::project::ProjectType;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub orchestrator: OrchestratorConfig,
    pub detection: DetectionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of engines executing simultaneously within one run
    pub max_concurrent_engines: usize,
    /// Default per-engine timeout, overridable per engine via TestConfiguration
    pub default_timeout_seconds: u64,
    /// Optional run-level ceiling; when exceeded, outstanding engines are
    /// cancelled and the run terminates in an error state
    pub run_timeout_seconds: Option<u64>,
    /// Overall score a run must reach to be considered production-ready
    pub readiness_threshold: f64,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_engines: 4,
            default_timeout_seconds: 300,
            run_timeout_seconds: None,
            readiness_threshold: 80.0,
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(Duration::from_secs)
    }
}

/// Retry configuration for engines that error (timeouts are never retried)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first failed invocation
    pub max_retries: u32,
    /// Linear backoff step between attempts (attempt n waits n * backoff_ms)
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 500,
        }
    }
}

/// Project type detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Tie-break order when markers for multiple project types are present
    pub priority: Vec<ProjectType>,
    /// Maximum directory depth scanned for marker files
    pub max_depth: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            priority: vec![
                ProjectType::Javascript,
                ProjectType::Python,
                ProjectType::Java,
            ],
            max_depth: 5,
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.orchestrator.validate()?;
        self.detection.validate()?;
        if self.logging.level.is_empty() {
            return Err(ValidationError::logging("level must not be empty"));
        }
        Ok(())
    }
}

impl Validate for OrchestratorConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_engines == 0 {
            return Err(ValidationError::orchestrator(
                "max_concurrent_engines must be > 0",
            ));
        }
        if self.default_timeout_seconds == 0 {
            return Err(ValidationError::orchestrator(
                "default_timeout_seconds must be > 0",
            ));
        }
        if !(0.0..=100.0).contains(&self.readiness_threshold) {
            return Err(ValidationError::orchestrator(
                "readiness_threshold must be within [0, 100]",
            ));
        }
        if let Some(ceiling) = self.run_timeout_seconds
            && ceiling == 0
        {
            return Err(ValidationError::orchestrator(
                "run_timeout_seconds must be > 0 when set",
            ));
        }
        Ok(())
    }
}

impl Validate for DetectionConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.priority.is_empty() {
            return Err(ValidationError::detection("priority must not be empty"));
        }
        if self.max_depth == 0 {
            return Err(ValidationError::detection("max_depth must be > 0"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("READYGATE").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.max_concurrent_engines, 4);
        assert_eq!(config.orchestrator.readiness_threshold, 80.0);
        assert!(config.orchestrator.run_timeout().is_none());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = OrchestratorConfig {
            max_concurrent_engines: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let config = OrchestratorConfig {
            readiness_threshold: 101.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn detection_priority_defaults_to_javascript_first() {
        let config = DetectionConfig::default();
        assert_eq!(config.priority[0], ProjectType::Javascript);
    }
}
