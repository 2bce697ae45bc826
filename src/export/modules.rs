//! Splitting samples into per-candidate Python modules plus a manifest.
//!
//! Completion `i` (1-based, per task, in file order) of task `HumanEval/20`
//! lands in `<out>/20__c<i>.py`. Completions without a function definition
//! are skipped but still consume their index.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::samples::SampleRecord;
use crate::benchmark::task_number;
use crate::error::ExportError;

/// One written candidate module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Short task number (`"20"`); manifests holding full ids are still read.
    pub task_id: String,
    /// Path of the `.py` file.
    pub module: String,
    pub index: usize,
}

impl ManifestEntry {
    /// File stem of the module (`20__c1`), usable as an import name.
    pub fn module_name(&self) -> Option<&str> {
        Path::new(&self.module).file_stem().and_then(|s| s.to_str())
    }

    /// Whether this entry belongs to `task_id`, given in full or short form.
    pub fn matches_task(&self, task_id: &str) -> bool {
        self.task_id == task_id || task_number(&self.task_id) == task_number(task_id)
    }
}

/// `<task_number>__c<index>`, rejecting numbers unusable in file names.
pub fn module_stem(task_id: &str, index: usize) -> Result<String, ExportError> {
    let number = task_number(task_id);
    let valid = !number.is_empty()
        && number
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ExportError::InvalidTaskId(task_id.to_string()));
    }
    Ok(format!("{}__c{}", number, index))
}

/// Whether some line of `code` starts a `def NAME(`.
pub fn defines_function(code: &str) -> bool {
    Regex::new(r"(?m)^\s*def\s+\w+\s*\(")
        .map(|re| re.is_match(code))
        .unwrap_or(false)
}

/// Groups completions per task, preserving first-seen task order.
pub fn group_by_task(records: &[SampleRecord]) -> Vec<(&str, Vec<&str>)> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(tid, _)| *tid == record.task_id) {
            Some((_, completions)) => completions.push(record.completion.as_str()),
            None => groups.push((record.task_id.as_str(), vec![record.completion.as_str()])),
        }
    }
    groups
}

/// Writes one module per completion that defines a function and returns
/// the manifest entries, in order.
pub fn split_samples(
    records: &[SampleRecord],
    out_dir: &Path,
) -> Result<Vec<ManifestEntry>, ExportError> {
    std::fs::create_dir_all(out_dir)?;

    let mut manifest = Vec::new();
    for (task_id, completions) in group_by_task(records) {
        for (i, code) in completions.into_iter().enumerate() {
            let index = i + 1;
            if !defines_function(code) {
                tracing::debug!(task_id = task_id, index = index, "Skipping completion without a function");
                continue;
            }
            let path: PathBuf = out_dir.join(format!("{}.py", module_stem(task_id, index)?));
            std::fs::write(&path, code)?;
            manifest.push(ManifestEntry {
                task_id: task_number(task_id).to_string(),
                module: path.display().to_string(),
                index,
            });
        }
    }

    tracing::info!(
        modules = manifest.len(),
        out_dir = %out_dir.display(),
        "Wrote candidate modules"
    );
    Ok(manifest)
}

/// Writes the manifest as pretty-printed JSON.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(entries)?)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ExportError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
