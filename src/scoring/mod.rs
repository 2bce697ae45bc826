//! pass@k scoring of generated completions.

pub mod local;
pub mod pass_at_k;

pub use local::{LocalScorer, PassAtKSummary, Scorer, TaskScore};
pub use pass_at_k::pass_at_k;
