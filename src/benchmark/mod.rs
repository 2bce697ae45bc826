//! Benchmark problems.
//!
//! Problems come from HumanEval-format JSONL files (`task_id`, `prompt`,
//! `test`, `entry_point`, optional `canonical_solution`).

pub mod problems;

pub use problems::{task_number, Benchmark, ProblemSpec};
