//! Structured generation: model call, extraction, validation, retry.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::repair::{repaired_variants, REPAIR_PASSES_V1};
use super::schema::{SchemaViolation, StructuredCandidate};
use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::metrics::MetricsCollector;
use crate::pipeline::config::SamplingConfig;
use crate::utils::json_extraction::candidate_spans;
use crate::utils::text::truncate;

/// Raw output longer than this is cut in debug logs.
const RAW_LOG_CHARS: usize = 600;

/// No usable candidate came out of any attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no structured candidate after {attempts} attempt(s): {last_reason}")]
pub struct NotProduced {
    pub attempts: u32,
    pub last_reason: String,
}

/// How a raw output turned into a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRoute {
    Direct,
    Repaired(&'static str),
}

/// Parses one raw model output into a candidate.
///
/// Every span from [`candidate_spans`] is tried in order, first as-is and
/// then through each cumulative repair. The error of the first span is
/// reported when nothing parses.
pub fn parse_candidate(raw: &str) -> Result<(StructuredCandidate, ParseRoute), SchemaViolation> {
    let mut first_error = None;

    for span in candidate_spans(raw) {
        match StructuredCandidate::parse(span) {
            Ok(candidate) => return Ok((candidate, ParseRoute::Direct)),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        for (pass, repaired) in repaired_variants(span, REPAIR_PASSES_V1) {
            if let Ok(candidate) = StructuredCandidate::parse(&repaired) {
                return Ok((candidate, ParseRoute::Repaired(pass)));
            }
        }
    }

    Err(first_error.unwrap_or_else(|| SchemaViolation::InvalidJson("empty output".to_string())))
}

/// Wraps the model backend and turns free text into [`StructuredCandidate`]s.
pub struct StructuredGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    sampling: SamplingConfig,
    metrics: MetricsCollector,
}

impl StructuredGenerator {
    /// Creates a generator using the backend's default model.
    pub fn new(provider: Arc<dyn LlmProvider>, sampling: SamplingConfig) -> Self {
        Self {
            provider,
            model: String::new(),
            sampling,
            metrics: MetricsCollector::new(),
        }
    }

    /// Sets the model identifier sent with every request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    /// Generates a candidate with the configured sampling parameters.
    pub async fn generate_structured(
        &self,
        prompt: &str,
    ) -> Result<StructuredCandidate, NotProduced> {
        self.generate_structured_with(prompt, &self.sampling).await
    }

    /// Generates a candidate, making up to `sampling.retries` model calls.
    ///
    /// Backend errors and schema violations both consume an attempt. No
    /// partial result is ever returned.
    pub async fn generate_structured_with(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<StructuredCandidate, NotProduced> {
        let retries = sampling.retries.max(1);
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=retries {
            let text = match self.complete(prompt, sampling).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Model call failed");
                    self.metrics.record_generation_attempt("backend_error");
                    last_reason = e.to_string();
                    continue;
                }
            };

            debug!(
                attempt = attempt,
                raw = %truncate(&text, RAW_LOG_CHARS),
                "Raw model output"
            );

            match parse_candidate(&text) {
                Ok((candidate, ParseRoute::Direct)) => {
                    self.metrics.record_generation_attempt("parsed");
                    return Ok(candidate);
                }
                Ok((candidate, ParseRoute::Repaired(pass))) => {
                    debug!(attempt = attempt, pass = pass, "Parsed after repair");
                    self.metrics.record_generation_attempt("repaired");
                    return Ok(candidate);
                }
                Err(violation) => {
                    warn!(attempt = attempt, reason = %violation, "Structured output rejected");
                    self.metrics.record_generation_attempt("rejected");
                    last_reason = violation.to_string();
                }
            }
        }

        Err(NotProduced {
            attempts: retries,
            last_reason,
        })
    }

    /// Plain text generation, used where no schema applies (test augmentation).
    pub async fn generate_text(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let sampling = SamplingConfig {
            max_tokens,
            constrained_json: false,
            ..self.sampling.clone()
        };
        self.complete(prompt, &sampling).await
    }

    async fn complete(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String, LlmError> {
        let mut request = GenerationRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_temperature(sampling.temperature)
            .with_max_tokens(sampling.max_tokens)
            .with_top_p(sampling.top_p);
        if sampling.constrained_json {
            request = request.with_response_format(StructuredCandidate::response_format());
        }

        let response = self.provider.generate(request).await?;
        response
            .first_content()
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LlmError::ParseError("response has no choices".to_string()))
    }
}

impl std::fmt::Debug for StructuredGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredGenerator")
            .field("model", &self.model)
            .field("sampling", &self.sampling)
            .finish()
    }
}
