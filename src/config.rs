//! Configuration management for conquer.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::execution::{ExecutionOptions, NonZeroExitPolicy, ProcessRunner, DEFAULT_KILL_GRACE};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Execution defaults.
    pub execution: ExecutionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Execution configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Timeout in seconds; zero or negative disables it.
    pub timeout_secs: f64,
    /// How non-zero exit codes are reported.
    pub non_zero_exit: NonZeroExitPolicy,
    /// Grace period between the terminate request and a forced kill.
    pub kill_grace_ms: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            timeout_secs: 10.0,
            non_zero_exit: NonZeroExitPolicy::Error,
            kill_grace_ms: DEFAULT_KILL_GRACE.as_millis() as u64,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = lookup("CONQUER_TIMEOUT") {
            self.execution.timeout_secs = timeout
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CONQUER_TIMEOUT", timeout))?;
        }

        if let Some(level) = lookup("CONQUER_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(timeout) = args.timeout {
            self.execution.timeout_secs = timeout;
        }

        if args.allow_failure {
            self.execution.non_zero_exit = NonZeroExitPolicy::ReturnResult;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Execution options derived from this configuration.
    pub fn to_options(&self) -> ExecutionOptions {
        ExecutionOptions::new()
            .timeout_secs(self.execution.timeout_secs)
            .non_zero_exit(self.execution.non_zero_exit)
    }

    /// Runner tuned from this configuration.
    pub fn to_runner(&self) -> ProcessRunner {
        ProcessRunner::new().with_kill_grace(Duration::from_millis(self.execution.kill_grace_ms))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid value in an environment variable.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.execution.timeout_secs, 10.0);
        assert_eq!(config.execution.non_zero_exit, NonZeroExitPolicy::Error);
        assert_eq!(config.execution.kill_grace_ms, 2000);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "execution": {
                "timeout_secs": 2.5,
                "non_zero_exit": "return_result",
                "kill_grace_ms": 100
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.execution.timeout_secs, 2.5);
        assert_eq!(config.execution.non_zero_exit, NonZeroExitPolicy::ReturnResult);
        assert_eq!(config.execution.kill_grace_ms, 100);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "execution": { "timeout_secs": 0 } }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.execution.timeout_secs, 0.0);
        assert_eq!(config.execution.non_zero_exit, NonZeroExitPolicy::Error); // Default
        assert!(config.to_options().timeout.is_none());
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_apply_env() {
        let mut config = Config::default();
        config
            .apply_env_from(lookup(&[("CONQUER_TIMEOUT", "3"), ("RUST_LOG", "trace")]))
            .unwrap();

        assert_eq!(config.execution.timeout_secs, 3.0);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_log_level_env_precedence() {
        let mut config = Config::default();
        config
            .apply_env_from(lookup(&[("CONQUER_LOG_LEVEL", "warn"), ("RUST_LOG", "trace")]))
            .unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_apply_env_invalid_timeout() {
        let mut config = Config::default();
        let err = config
            .apply_env_from(lookup(&[("CONQUER_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("CONQUER_TIMEOUT"));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            timeout: Some(0.5),
            allow_failure: true,
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.execution.timeout_secs, 0.5);
        assert_eq!(config.execution.non_zero_exit, NonZeroExitPolicy::ReturnResult);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_to_options_and_runner() {
        let mut config = Config::default();
        config.execution.timeout_secs = 1.5;
        config.execution.kill_grace_ms = 250;

        let options = config.to_options();
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.non_zero_exit, NonZeroExitPolicy::Error);

        let runner = config.to_runner();
        assert_eq!(runner.kill_grace(), Duration::from_millis(250));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"timeout_secs\""));
        assert!(json.contains("\"non_zero_exit\": \"error\""));
    }
}
