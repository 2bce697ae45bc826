//! cot-bench: chain-of-thought and self-debugging code generation harness.
//!
//! A language model answers HumanEval-style problems as `{reasoning, code}`
//! JSON. Candidates run against each problem's verification routine in a
//! sandboxed execution facility, and failures are fed back to the model for
//! repair. Completions are written as JSONL and scored with pass@k.

pub mod augment;
pub mod benchmark;
pub mod cli;
pub mod error;
pub mod execution;
pub mod export;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod prompts;
pub mod scoring;
pub mod selfdebug;
pub mod structured;
pub mod utils;

// Re-export commonly used error types
pub use error::{
    AugmentError, BenchmarkError, ExecutionError, ExportError, LlmError, ScoreError,
};
