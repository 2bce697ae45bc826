//! Harness configuration.
//!
//! Configuration is layered: built-in defaults, then an optional YAML run
//! file, then `COT_BENCH_*` environment variables, then CLI flags. Each layer
//! only overrides what it names.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::DEFAULT_MODEL;
use crate::selfdebug::Strategy;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The run file is not valid YAML for this schema.
    #[error("Invalid run file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Sampling parameters for every structured generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Maximum number of new tokens per model call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling parameter.
    pub top_p: f64,
    /// Model calls per structured generation before giving up.
    pub retries: u32,
    /// Ask the server for JSON-schema constrained decoding.
    pub constrained_json: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2024,
            temperature: 0.2,
            top_p: 0.95,
            retries: 3,
            constrained_json: false,
        }
    }
}

/// Which execution facility runs candidate code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    /// A local interpreter process with a wall-clock timeout.
    #[default]
    Subprocess,
    /// A throwaway container with no network and capped resources.
    Docker,
}

impl FacilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityKind::Subprocess => "subprocess",
            FacilityKind::Docker => "docker",
        }
    }
}

impl std::fmt::Display for FacilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subprocess" | "local" => Ok(FacilityKind::Subprocess),
            "docker" => Ok(FacilityKind::Docker),
            other => Err(format!(
                "unknown facility '{}', expected 'subprocess' or 'docker'",
                other
            )),
        }
    }
}

/// Settings for running candidate code against verification routines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub facility: FacilityKind,
    /// Interpreter used by the subprocess facility.
    pub python_bin: String,
    /// Image used by the docker facility.
    pub docker_image: String,
    /// Memory limit for docker runs (in MB).
    pub docker_memory_mb: u64,
    /// CPU cores allocated to docker runs.
    pub docker_cpu_cores: f64,
    /// Run docker jobs with `--network=none`.
    pub network_disabled: bool,
    /// Wall-clock limit for one execution job, in seconds.
    pub timeout_secs: u64,
    /// Traceback frames kept in failure diagnostics.
    pub traceback_frames: u32,
    /// Diagnostics longer than this are truncated before reaching a prompt.
    pub max_diagnostic_chars: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            facility: FacilityKind::Subprocess,
            python_bin: "python3".to_string(),
            docker_image: "python:3.12-slim".to_string(),
            docker_memory_mb: 512,
            docker_cpu_cores: 1.0,
            network_disabled: true,
            timeout_secs: 10,
            traceback_frames: 5,
            max_diagnostic_chars: 4000,
        }
    }
}

impl ExecutionConfig {
    /// The per-job wall-clock limit.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub strategy: Strategy,
    /// Independent attempts launched per task.
    pub attempts_per_task: usize,
    /// Round budget of one self-debug session.
    pub max_rounds: u32,
    /// First benchmark index of the sample window.
    pub sample_start: usize,
    /// Exclusive end of the sample window (clamped to the benchmark size).
    pub sample_stop: usize,
    /// Stride through the sample window.
    pub sample_step: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::SelfDebug,
            attempts_per_task: 3,
            max_rounds: 3,
            sample_start: 0,
            sample_stop: 100,
            sample_step: 10,
        }
    }
}

/// Top-level configuration of the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Model identifier sent to the backend.
    pub model: String,
    pub sampling: SamplingConfig,
    pub execution: ExecutionConfig,
    pub run: RunConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            sampling: SamplingConfig::default(),
            execution: ExecutionConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from defaults plus environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the result
    /// does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a YAML run file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` or `ConfigError::Yaml` if the file cannot be
    /// read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parses a YAML run configuration.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Applies `COT_BENCH_*` environment variables on top of `self`.
    ///
    /// # Environment Variables
    ///
    /// - `COT_BENCH_MODEL`: Model identifier
    /// - `COT_BENCH_MAX_TOKENS`: Max new tokens per call (default: 2024)
    /// - `COT_BENCH_TEMPERATURE`: Sampling temperature (default: 0.2)
    /// - `COT_BENCH_TOP_P`: Nucleus sampling (default: 0.95)
    /// - `COT_BENCH_RETRIES`: Model calls per structured generation (default: 3)
    /// - `COT_BENCH_CONSTRAINED_JSON`: Request JSON-schema decoding (default: false)
    /// - `COT_BENCH_FACILITY`: `subprocess` or `docker` (default: subprocess)
    /// - `COT_BENCH_PYTHON`: Interpreter for the subprocess facility (default: python3)
    /// - `COT_BENCH_DOCKER_IMAGE`: Image for the docker facility (default: python:3.12-slim)
    /// - `COT_BENCH_DOCKER_MEMORY_MB`: Docker memory limit (default: 512)
    /// - `COT_BENCH_DOCKER_CPU_CORES`: Docker CPU cores (default: 1.0)
    /// - `COT_BENCH_EXEC_TIMEOUT_SECS`: Per-job timeout (default: 10)
    /// - `COT_BENCH_STRATEGY`: `cot`, `self_edit` or `self_debug` (default: self_debug)
    /// - `COT_BENCH_ATTEMPTS`: Attempts per task (default: 3)
    /// - `COT_BENCH_MAX_ROUNDS`: Self-debug rounds (default: 3)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var("COT_BENCH_MODEL") {
            self.model = val;
        }

        // Sampling
        if let Ok(val) = std::env::var("COT_BENCH_MAX_TOKENS") {
            self.sampling.max_tokens = parse_env_value(&val, "COT_BENCH_MAX_TOKENS")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_TEMPERATURE") {
            self.sampling.temperature = parse_env_value(&val, "COT_BENCH_TEMPERATURE")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_TOP_P") {
            self.sampling.top_p = parse_env_value(&val, "COT_BENCH_TOP_P")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_RETRIES") {
            self.sampling.retries = parse_env_value(&val, "COT_BENCH_RETRIES")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_CONSTRAINED_JSON") {
            self.sampling.constrained_json = parse_env_bool(&val, "COT_BENCH_CONSTRAINED_JSON")?;
        }

        // Execution
        if let Ok(val) = std::env::var("COT_BENCH_FACILITY") {
            self.execution.facility = parse_env_value(&val, "COT_BENCH_FACILITY")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_PYTHON") {
            self.execution.python_bin = val;
        }
        if let Ok(val) = std::env::var("COT_BENCH_DOCKER_IMAGE") {
            self.execution.docker_image = val;
        }
        if let Ok(val) = std::env::var("COT_BENCH_DOCKER_MEMORY_MB") {
            self.execution.docker_memory_mb = parse_env_value(&val, "COT_BENCH_DOCKER_MEMORY_MB")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_DOCKER_CPU_CORES") {
            self.execution.docker_cpu_cores = parse_env_value(&val, "COT_BENCH_DOCKER_CPU_CORES")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_EXEC_TIMEOUT_SECS") {
            self.execution.timeout_secs = parse_env_value(&val, "COT_BENCH_EXEC_TIMEOUT_SECS")?;
        }

        // Run
        if let Ok(val) = std::env::var("COT_BENCH_STRATEGY") {
            self.run.strategy = parse_env_value(&val, "COT_BENCH_STRATEGY")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_ATTEMPTS") {
            self.run.attempts_per_task = parse_env_value(&val, "COT_BENCH_ATTEMPTS")?;
        }
        if let Ok(val) = std::env::var("COT_BENCH_MAX_ROUNDS") {
            self.run.max_rounds = parse_env_value(&val, "COT_BENCH_MAX_ROUNDS")?;
        }

        Ok(self)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        // Sampling validation
        if self.sampling.retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "retries must be at least 1".to_string(),
            ));
        }
        if self.sampling.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.sampling.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(self.sampling.top_p > 0.0 && self.sampling.top_p <= 1.0) {
            return Err(ConfigError::ValidationFailed(
                "top_p must be in (0.0, 1.0]".to_string(),
            ));
        }

        // Execution validation
        if self.execution.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "execution timeout must be greater than 0".to_string(),
            ));
        }
        if self.execution.python_bin.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "python_bin cannot be empty".to_string(),
            ));
        }
        if self.execution.facility == FacilityKind::Docker {
            if self.execution.docker_image.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "docker_image cannot be empty".to_string(),
                ));
            }
            if self.execution.docker_memory_mb < 64 {
                return Err(ConfigError::ValidationFailed(
                    "docker_memory_mb must be at least 64 MB".to_string(),
                ));
            }
            if self.execution.docker_cpu_cores <= 0.0 {
                return Err(ConfigError::ValidationFailed(
                    "docker_cpu_cores must be greater than 0".to_string(),
                ));
            }
        }
        if self.execution.max_diagnostic_chars == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_diagnostic_chars must be greater than 0".to_string(),
            ));
        }

        // Run validation
        if self.run.attempts_per_task == 0 {
            return Err(ConfigError::ValidationFailed(
                "attempts_per_task must be greater than 0".to_string(),
            ));
        }
        if self.run.max_rounds == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_rounds must be greater than 0".to_string(),
            ));
        }
        if self.run.sample_step == 0 {
            return Err(ConfigError::ValidationFailed(
                "sample_step must be greater than 0".to_string(),
            ));
        }
        if self.run.sample_start >= self.run.sample_stop {
            return Err(ConfigError::ValidationFailed(
                "sample_start must be below sample_stop".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set the sampling parameters.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Builder method to set the execution facility.
    pub fn with_facility(mut self, facility: FacilityKind) -> Self {
        self.execution.facility = facility;
        self
    }

    /// Builder method to set the per-job execution timeout.
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.execution.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Builder method to set the generation strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.run.strategy = strategy;
        self
    }

    /// Builder method to set attempts per task.
    pub fn with_attempts_per_task(mut self, attempts: usize) -> Self {
        self.run.attempts_per_task = attempts;
        self
    }

    /// Builder method to set the self-debug round budget.
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.run.max_rounds = rounds;
        self
    }

    /// Builder method to set the sample window.
    pub fn with_sample_window(mut self, start: usize, stop: usize, step: usize) -> Self {
        self.run.sample_start = start;
        self.run.sample_stop = stop;
        self.run.sample_step = step;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
