//! HumanEval-format problem loading and lookup.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BenchmarkError;

/// One benchmark task: prompt, verification routine and entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSpec {
    /// Identifier such as `HumanEval/20`.
    pub task_id: String,
    /// Signature plus docstring shown to the model.
    pub prompt: String,
    /// Python source defining `check(candidate)`.
    pub test: String,
    /// Name of the function the task asks for.
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_solution: Option<String>,
}

impl ProblemSpec {
    pub fn new(
        task_id: impl Into<String>,
        prompt: impl Into<String>,
        test: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            prompt: prompt.into(),
            test: test.into(),
            entry_point: entry_point.into(),
            canonical_solution: None,
        }
    }

    pub fn with_canonical_solution(mut self, solution: impl Into<String>) -> Self {
        self.canonical_solution = Some(solution.into());
        self
    }

    /// The part of the task id after the last `/` (`"20"` for `HumanEval/20`).
    pub fn task_number(&self) -> &str {
        task_number(&self.task_id)
    }

    /// Lines of the verification routine that contain an assertion, trimmed.
    pub fn assert_lines(&self) -> Vec<&str> {
        self.test
            .lines()
            .filter(|line| line.contains("assert "))
            .map(str::trim)
            .collect()
    }
}

/// The part of `task_id` after the last `/`.
pub fn task_number(task_id: &str) -> &str {
    task_id.rsplit('/').next().unwrap_or(task_id)
}

/// An ordered, indexed set of problems.
#[derive(Debug, Clone, Default)]
pub struct Benchmark {
    problems: Vec<ProblemSpec>,
    index: HashMap<String, usize>,
}

impl Benchmark {
    pub fn new(problems: Vec<ProblemSpec>) -> Self {
        let index = problems
            .iter()
            .enumerate()
            .map(|(i, p)| (p.task_id.clone(), i))
            .collect();
        Self { problems, index }
    }

    /// Loads a JSONL file with one problem per line.
    ///
    /// # Errors
    ///
    /// Returns `BenchmarkError::Io` if the file cannot be read,
    /// `MalformedRecord` for a bad line and `Empty` if no problem was found.
    pub fn load_jsonl(path: &Path) -> Result<Self, BenchmarkError> {
        let text = std::fs::read_to_string(path)?;
        let benchmark = Self::from_jsonl_str(&text)?;
        if benchmark.is_empty() {
            return Err(BenchmarkError::Empty(path.display().to_string()));
        }
        tracing::info!(
            path = %path.display(),
            problems = benchmark.len(),
            "Loaded benchmark"
        );
        Ok(benchmark)
    }

    /// Parses JSONL text. Blank lines are skipped.
    pub fn from_jsonl_str(text: &str) -> Result<Self, BenchmarkError> {
        let mut problems = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let problem: ProblemSpec =
                serde_json::from_str(line).map_err(|e| BenchmarkError::MalformedRecord {
                    line: i + 1,
                    reason: e.to_string(),
                })?;
            problems.push(problem);
        }
        Ok(Self::new(problems))
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problems(&self) -> &[ProblemSpec] {
        &self.problems
    }

    /// Resolves a full or short task id (`"20"` matches `HumanEval/20`).
    pub fn resolve_task_id(&self, id: &str) -> Option<&str> {
        if let Some(&i) = self.index.get(id) {
            return Some(&self.problems[i].task_id);
        }
        let suffix = format!("/{}", id);
        let infix = format!("/{}_", id);
        self.problems
            .iter()
            .map(|p| p.task_id.as_str())
            .find(|tid| tid.ends_with(&suffix) || tid.contains(&infix))
    }

    /// Looks a problem up by full or short task id.
    pub fn get(&self, id: &str) -> Result<&ProblemSpec, BenchmarkError> {
        let resolved = self
            .resolve_task_id(id)
            .ok_or_else(|| BenchmarkError::TaskNotFound(id.to_string()))?;
        self.index
            .get(resolved)
            .map(|&i| &self.problems[i])
            .ok_or_else(|| BenchmarkError::TaskNotFound(id.to_string()))
    }

    /// Problems at indices `start, start+step, ...` below `min(len, stop)`.
    pub fn sample(&self, start: usize, stop: usize, step: usize) -> Vec<&ProblemSpec> {
        let stop = stop.min(self.problems.len());
        if start >= stop {
            return Vec::new();
        }
        self.problems[start..stop]
            .iter()
            .step_by(step.max(1))
            .collect()
    }
}
