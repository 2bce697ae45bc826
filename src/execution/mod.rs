//! Candidate execution.
//!
//! Generated code is never run in-process. A [`CandidateExecutor`] hands a
//! small Python harness plus a JSON job to an [`ExecutionFacility`] (a local
//! interpreter subprocess or a throwaway Docker container), reads back a
//! nonce-tagged verdict and turns it into an [`ExecutionOutcome`].
//!
//! ```text
//! code + ProblemSpec ─▶ CandidateExecutor ─▶ ExecutionFacility (python3 -I -c HARNESS)
//!                               ▲                       │
//!                               └──── verdict line ◀────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cot_bench::execution::CandidateExecutor;
//! use cot_bench::pipeline::ExecutionConfig;
//!
//! let executor = CandidateExecutor::from_config(&ExecutionConfig::default());
//! let outcome = executor.execute(&candidate, &problem).await;
//! if let Some(diagnostic) = outcome.diagnostic() {
//!     eprintln!("{diagnostic}");
//! }
//! ```

pub mod executor;
pub mod facility;
pub mod harness;
pub mod triage;

pub use executor::{binding_target, CandidateExecutor, ExecutionOutcome, NO_FUNCTION_DIAGNOSTIC};
pub use facility::{
    facility_from_config, DockerFacility, ExecutionFacility, ExecutionJob, ExecutionReport,
    SubprocessFacility,
};
pub use harness::{HarnessMode, HarnessPayload, HarnessVerdict, VerdictStatus};
pub use triage::{FailingAssertion, TriageReport};
