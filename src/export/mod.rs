//! Run artifacts: `samples.jsonl`, candidate modules and their manifest.

pub mod modules;
pub mod samples;

pub use modules::{
    defines_function, group_by_task, module_stem, read_manifest, split_samples, write_manifest,
    ManifestEntry,
};
pub use samples::{parse_samples, read_samples, write_samples, SampleRecord};
