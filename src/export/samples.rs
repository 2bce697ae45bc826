//! `samples.jsonl`: one `{task_id, completion}` record per line.

use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// One generated completion for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub task_id: String,
    pub completion: String,
}

impl SampleRecord {
    pub fn new(task_id: impl Into<String>, completion: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            completion: completion.into(),
        }
    }
}

/// Writes records as JSONL, creating parent directories.
pub fn write_samples(path: &Path, records: &[SampleRecord]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), records = records.len(), "Saved samples");
    Ok(())
}

/// Reads a JSONL samples file. Blank lines are skipped.
pub fn read_samples(path: &Path) -> Result<Vec<SampleRecord>, ExportError> {
    let text = std::fs::read_to_string(path)?;
    parse_samples(&text)
}

/// Parses JSONL sample text.
pub fn parse_samples(text: &str) -> Result<Vec<SampleRecord>, ExportError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| ExportError::MalformedRecord {
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results/samples.jsonl");
        let records = vec![
            SampleRecord::new("HumanEval/0", "def f(x):\n    return \"x\"\n"),
            SampleRecord::new("HumanEval/0", "def f(x):\n    return 1\n"),
        ];
        write_samples(&path, &records).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(read_samples(&path).unwrap(), records);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let text = "{\"task_id\": \"a\", \"completion\": \"b\"}\n\n{\"task_id\": \"a\"}\n";
        let err = parse_samples(text).unwrap_err();
        assert!(matches!(err, ExportError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_samples(Path::new("/nonexistent/samples.jsonl")).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));
    }
}
