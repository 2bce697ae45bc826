//! Structured generation of `{reasoning, code}` candidates.
//!
//! The generator sends a prompt to the model backend, locates a JSON object
//! in whatever comes back, validates it against [`StructuredCandidate`] and
//! retries with a small set of deterministic repairs. It either yields a
//! valid candidate or [`NotProduced`]; there is no degraded middle ground.
//!
//! ```ignore
//! use std::sync::Arc;
//! use cot_bench::llm::ChatCompletionsClient;
//! use cot_bench::pipeline::SamplingConfig;
//! use cot_bench::structured::StructuredGenerator;
//!
//! let provider = Arc::new(ChatCompletionsClient::local()?);
//! let generator = StructuredGenerator::new(provider, SamplingConfig::default());
//! let candidate = generator.generate_structured(&prompt).await?;
//! println!("{}", candidate.code);
//! ```

pub mod generator;
pub mod repair;
pub mod schema;

pub use generator::{parse_candidate, NotProduced, ParseRoute, StructuredGenerator};
pub use repair::{repaired_variants, RepairPass, REPAIR_PASSES_V1};
pub use schema::{SchemaViolation, StructuredCandidate, FUNCTION_KEYWORD};
