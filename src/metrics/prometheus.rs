//! Prometheus metrics registration and export.
//!
//! Defines every metric cot-bench records and the functions to initialise
//! and export them. Metrics live in a process registry behind `OnceLock`s so
//! recording is a no-op until [`init_metrics`] has run.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

/// Serialises initialisation so every metric lands in the same registry.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Global Prometheus registry for all cot-bench metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Structured generation attempts, labeled by result
/// (`parsed`, `repaired`, `rejected`, `backend_error`).
pub static GENERATION_ATTEMPTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Candidate executions, labeled by outcome (`success`, `assertion_failure`, `runtime_failure`).
pub static EXECUTION_OUTCOMES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Candidate execution wall time in seconds, labeled by outcome.
pub static EXECUTION_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Finished self-debug sessions, labeled by termination
/// (`passed`, `exhausted`, `generator_breakdown`).
pub static SESSIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Rounds consumed per self-debug session, labeled by termination.
pub static SESSION_ROUNDS: OnceLock<HistogramVec> = OnceLock::new();

/// Total LLM API requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// LLM API request latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Safe to call more than once; later calls leave the first registry in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric construction or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let generation_attempts = CounterVec::new(
        Opts::new(
            "cot_bench_generation_attempts_total",
            "Structured generation attempts by result",
        ),
        &["result"],
    )?;

    let execution_outcomes = CounterVec::new(
        Opts::new(
            "cot_bench_execution_outcomes_total",
            "Candidate executions by outcome",
        ),
        &["outcome"],
    )?;

    let execution_duration = HistogramVec::new(
        HistogramOpts::new(
            "cot_bench_execution_duration_seconds",
            "Candidate execution wall time in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["outcome"],
    )?;

    let sessions_total = CounterVec::new(
        Opts::new(
            "cot_bench_sessions_total",
            "Self-debug sessions by termination",
        ),
        &["termination"],
    )?;

    let session_rounds = HistogramVec::new(
        HistogramOpts::new(
            "cot_bench_session_rounds",
            "Rounds consumed per self-debug session",
        )
        .buckets(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 8.0]),
        &["termination"],
    )?;

    let llm_requests_total = CounterVec::new(
        Opts::new("cot_bench_llm_requests_total", "Total LLM API requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        HistogramOpts::new(
            "cot_bench_llm_latency_seconds",
            "LLM API request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["model"],
    )?;

    registry.register(Box::new(generation_attempts.clone()))?;
    registry.register(Box::new(execution_outcomes.clone()))?;
    registry.register(Box::new(execution_duration.clone()))?;
    registry.register(Box::new(sessions_total.clone()))?;
    registry.register(Box::new(session_rounds.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = GENERATION_ATTEMPTS_TOTAL.set(generation_attempts);
    let _ = EXECUTION_OUTCOMES_TOTAL.set(execution_outcomes);
    let _ = EXECUTION_DURATION.set(execution_duration);
    let _ = SESSIONS_TOTAL.set(sessions_total);
    let _ = SESSION_ROUNDS.set(session_rounds);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns an explanatory comment line when the registry has not been
/// initialised or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
