//! Coverage- and specification-driven test augmentation.
//!
//! Takes candidate modules written by [`crate::export::split_samples`], asks
//! the model for new pytest tests and keeps the ones that look complete.

pub mod augmenter;
pub mod finalize;

pub use augmenter::{AugmentMode, AugmentedTests, TestAugmenter, AUGMENT_MAX_TOKENS};
pub use finalize::{clean_spec_assertions, first_function_name, render_test_file, usable_tests};
