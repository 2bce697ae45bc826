//! Run configuration and the run driver.
//!
//! ```rust,ignore
//! use cot_bench::pipeline::{HarnessConfig, RunDriver};
//!
//! let config = HarnessConfig::from_env()?;
//! let driver = RunDriver::new(solver, config.run.clone());
//! let output = driver.run(&benchmark).await;
//! write_samples(Path::new("results/samples.jsonl"), &output.records)?;
//! println!("{}", output.summary);
//! ```

pub mod config;
pub mod runner;

pub use config::{
    ConfigError, ExecutionConfig, FacilityKind, HarnessConfig, RunConfig, SamplingConfig,
};
pub use runner::{RunDriver, RunOutput, RunSummary};
