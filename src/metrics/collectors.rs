//! High-level metric recording for cot-bench operations.
//!
//! `MetricsCollector` wraps the raw Prometheus metrics with consistent
//! labeling. Every method silently does nothing when metrics were never
//! initialised, so library code can record unconditionally.

use super::prometheus::{
    EXECUTION_DURATION, EXECUTION_OUTCOMES_TOTAL, GENERATION_ATTEMPTS_TOTAL, LLM_LATENCY,
    LLM_REQUESTS_TOTAL, SESSIONS_TOTAL, SESSION_ROUNDS,
};

/// Metrics collector for recording cot-bench operational metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Create a new MetricsCollector instance.
    pub fn new() -> Self {
        Self
    }

    /// Record one structured generation attempt.
    ///
    /// `result` is one of `parsed`, `repaired`, `rejected`, `backend_error`.
    pub fn record_generation_attempt(&self, result: &str) {
        if let Some(attempts) = GENERATION_ATTEMPTS_TOTAL.get() {
            attempts.with_label_values(&[result]).inc();
        }
        tracing::trace!(result = result, "Recorded generation attempt");
    }

    /// Record one candidate execution.
    pub fn record_execution(&self, outcome: &str, duration_secs: f64) {
        if let Some(outcomes) = EXECUTION_OUTCOMES_TOTAL.get() {
            outcomes.with_label_values(&[outcome]).inc();
        }
        if let Some(duration) = EXECUTION_DURATION.get() {
            duration.with_label_values(&[outcome]).observe(duration_secs);
        }
        tracing::trace!(
            outcome = outcome,
            duration_secs = duration_secs,
            "Recorded execution"
        );
    }

    /// Record a finished self-debug session.
    pub fn record_session(&self, termination: &str, rounds: u32) {
        if let Some(sessions) = SESSIONS_TOTAL.get() {
            sessions.with_label_values(&[termination]).inc();
        }
        if let Some(session_rounds) = SESSION_ROUNDS.get() {
            session_rounds
                .with_label_values(&[termination])
                .observe(f64::from(rounds));
        }
        tracing::trace!(
            termination = termination,
            rounds = rounds,
            "Recorded session"
        );
    }

    /// Record an LLM API request.
    pub fn record_llm_request(&self, model: &str, success: bool, latency_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(requests) = LLM_REQUESTS_TOTAL.get() {
            requests.with_label_values(&[model, status]).inc();
        }
        if let Some(latency) = LLM_LATENCY.get() {
            latency.with_label_values(&[model]).observe(latency_secs);
        }
    }
}
