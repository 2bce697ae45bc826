//! Error types for cot-bench operations.
//!
//! Defines error types for the subsystems that can fail outright:
//! - Model backend interactions
//! - Execution facility (the sandbox could not run a job at all)
//! - Benchmark loading and lookup
//! - Artifact export (samples, modules, manifests)
//! - Scoring
//! - Test augmentation
//!
//! Failures of generated code are *not* errors; they are reported as
//! [`crate::execution::ExecutionOutcome`] values.

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: COT_BENCH_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Context length exceeded: {limit} tokens")]
    ContextLengthExceeded { limit: u32 },

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by an execution facility that could not run a job.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Failed to write job input: {0}")]
    InputFailed(String),

    #[error("Docker run failed: {0}")]
    DockerFailed(String),

    #[error("Failed to encode job payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while loading or querying a benchmark.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Task '{0}' not found in benchmark")]
    TaskNotFound(String),

    #[error("Malformed problem record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Benchmark file '{0}' contains no problems")]
    Empty(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while writing or reading run artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Malformed sample record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Invalid task id '{0}': expected '<benchmark>/<number>'")]
    InvalidTaskId(String),

    #[error("No manifest entry for task '{0}'")]
    MissingManifestEntry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while scoring a set of completions.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("No k values requested")]
    NoKValues,

    #[error("k must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("No records to score")]
    NoRecords,

    #[error("Benchmark error: {0}")]
    Benchmark(#[from] BenchmarkError),
}

/// Errors that can occur while generating augmented tests.
#[derive(Debug, Error)]
pub enum AugmentError {
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("No function definition in '{0}'")]
    NoFunction(String),

    #[error("Model returned no usable tests for '{0}'")]
    NoTests(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
