//! Shared utility functions for cot-bench.
//!
//! Locating JSON in raw model output, and trimming text for logs and prompts.

pub mod json_extraction;
pub mod text;

pub use json_extraction::{
    candidate_spans, extract_from_json_code_block, find_matching_brace, first_balanced_object,
    outermost_object_span, strip_code_fences,
};
pub use text::{normalize_whitespace, tail, truncate};
