//! Prompt templates.
//!
//! - [`codegen`] - chain-of-thought generation, self-review and repair prompts
//! - [`augmentation`] - coverage-driven tests, spec-driven tests and formal
//!   specification assertions
//!
//! # Usage
//!
//! ```
//! use cot_bench::prompts::{build_cot_prompt, build_debug_prompt};
//!
//! let first = build_cot_prompt("def add(a, b):\n    '''Return a + b.'''\n");
//! let repair = build_debug_prompt(
//!     "def add(a, b):",
//!     r#"{"reasoning": "sum", "code": "def add(a, b): return a - b"}"#,
//!     "AssertionError",
//! );
//! assert!(first.contains("def add"));
//! assert!(repair.contains("AssertionError"));
//! ```

pub mod augmentation;
pub mod codegen;

pub use augmentation::{
    build_coverage_prompt, build_spec_assertions_prompt, build_spec_tests_prompt,
};
pub use codegen::{build_cot_prompt, build_debug_prompt, build_reflection_prompt};
