//! Command-line interface for cot-bench.
//!
//! Provides the run, score, split, augment and triage commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
