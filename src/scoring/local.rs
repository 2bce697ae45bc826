//! Local pass@k scoring through the candidate executor.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::pass_at_k::pass_at_k;
use crate::benchmark::Benchmark;
use crate::error::ScoreError;
use crate::execution::CandidateExecutor;
use crate::export::{group_by_task, SampleRecord};

/// Per-task tally of executed completions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskScore {
    pub task_id: String,
    /// Completions executed.
    pub total: usize,
    /// Completions that passed.
    pub passed: usize,
}

/// Averaged pass@k per requested k, plus the per-task tallies behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassAtKSummary {
    /// `"pass@1" -> 0.42`. A k is absent when no task had `k` samples.
    pub pass_at_k: BTreeMap<String, f64>,
    pub tasks: Vec<TaskScore>,
    pub records: usize,
}

impl PassAtKSummary {
    /// Averages the estimator over tasks; tasks with fewer than `k`
    /// samples are ignored for that `k`.
    pub fn from_tasks(tasks: Vec<TaskScore>, k_values: &[usize]) -> Self {
        let mut pass_at = BTreeMap::new();
        for &k in k_values {
            let scores: Vec<f64> = tasks
                .iter()
                .filter(|t| t.total >= k)
                .map(|t| pass_at_k(t.total, t.passed, k))
                .collect();
            if scores.is_empty() {
                continue;
            }
            pass_at.insert(
                format!("pass@{}", k),
                scores.iter().sum::<f64>() / scores.len() as f64,
            );
        }
        let records = tasks.iter().map(|t| t.total).sum();
        Self {
            pass_at_k: pass_at,
            tasks,
            records,
        }
    }

    pub fn get(&self, k: usize) -> Option<f64> {
        self.pass_at_k.get(&format!("pass@{}", k)).copied()
    }
}

impl std::fmt::Display for PassAtKSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .pass_at_k
            .iter()
            .map(|(name, value)| format!("{}: {:.4}", name, value))
            .collect();
        write!(
            f,
            "{} ({} tasks, {} completions)",
            parts.join(", "),
            self.tasks.len(),
            self.records
        )
    }
}

fn validate_request(records: &[SampleRecord], k_values: &[usize]) -> Result<(), ScoreError> {
    if k_values.is_empty() {
        return Err(ScoreError::NoKValues);
    }
    if let Some(&k) = k_values.iter().find(|&&k| k == 0) {
        return Err(ScoreError::InvalidK(k));
    }
    if records.is_empty() {
        return Err(ScoreError::NoRecords);
    }
    Ok(())
}

/// Something that turns completion records into a pass@k summary.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(
        &self,
        records: &[SampleRecord],
        k_values: &[usize],
        timeout: Duration,
    ) -> Result<PassAtKSummary, ScoreError>;
}

/// Runs every record, preceded by its problem's prompt, against the
/// problem's verification routine.
#[derive(Debug)]
pub struct LocalScorer {
    benchmark: Benchmark,
    executor: CandidateExecutor,
}

impl LocalScorer {
    pub fn new(benchmark: Benchmark, executor: CandidateExecutor) -> Self {
        Self {
            benchmark,
            executor,
        }
    }

    pub fn benchmark(&self) -> &Benchmark {
        &self.benchmark
    }
}

#[async_trait]
impl Scorer for LocalScorer {
    async fn score(
        &self,
        records: &[SampleRecord],
        k_values: &[usize],
        timeout: Duration,
    ) -> Result<PassAtKSummary, ScoreError> {
        validate_request(records, k_values)?;
        let executor = self
            .executor
            .clone()
            .with_timeout(timeout)
            .with_prompt_prefix();

        let mut tasks = Vec::new();
        for (task_id, completions) in group_by_task(records) {
            let problem = self.benchmark.get(task_id)?;
            let mut passed = 0;
            for completion in &completions {
                let outcome = executor.execute_code(completion, problem).await;
                if outcome.is_success() {
                    passed += 1;
                }
            }
            debug!(
                task_id = %problem.task_id,
                total = completions.len(),
                passed = passed,
                "Scored task"
            );
            tasks.push(TaskScore {
                task_id: problem.task_id.clone(),
                total: completions.len(),
                passed,
            });
        }

        let summary = PassAtKSummary::from_tasks(tasks, k_values);
        info!(summary = %summary, "Scoring complete");
        Ok(summary)
    }
}
