//! The run driver: sample problems, run attempts, collect completions.
//!
//! Every attempt is a fresh session. A problem whose attempts all come back
//! empty contributes no records; it never aborts the run.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::config::RunConfig;
use crate::benchmark::{Benchmark, ProblemSpec};
use crate::export::SampleRecord;
use crate::selfdebug::{SessionReport, Solver, Termination};

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub strategy: String,
    pub tasks: usize,
    pub attempts: usize,
    pub completions: usize,
    pub passed: usize,
    pub exhausted: usize,
    pub broken_down: usize,
    pub unverified: usize,
    pub wall_time_secs: f64,
}

impl RunSummary {
    fn record(&mut self, report: &SessionReport) {
        self.attempts += 1;
        match report.termination {
            Termination::Passed => self.passed += 1,
            Termination::Exhausted => self.exhausted += 1,
            Termination::GeneratorBreakdown => self.broken_down += 1,
            Termination::Unverified => self.unverified += 1,
        }
        if report.candidate.is_some() {
            self.completions += 1;
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tasks, {} attempts, {} completions (passed {}, exhausted {}, broken down {}, unverified {}) in {:.1}s",
            self.tasks,
            self.attempts,
            self.completions,
            self.passed,
            self.exhausted,
            self.broken_down,
            self.unverified,
            self.wall_time_secs
        )
    }
}

/// Records plus the summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub records: Vec<SampleRecord>,
    pub summary: RunSummary,
}

/// Drives a [`Solver`] over a sample of problems.
#[derive(Debug, Clone)]
pub struct RunDriver {
    solver: Solver,
    config: RunConfig,
}

impl RunDriver {
    pub fn new(solver: Solver, config: RunConfig) -> Self {
        Self { solver, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the configured sample window of `benchmark`.
    pub async fn run(&self, benchmark: &Benchmark) -> RunOutput {
        let problems = benchmark.sample(
            self.config.sample_start,
            self.config.sample_stop,
            self.config.sample_step,
        );
        self.run_problems(&problems).await
    }

    /// Runs `attempts_per_task` independent attempts on each problem in order.
    pub async fn run_problems(&self, problems: &[&ProblemSpec]) -> RunOutput {
        let started = Instant::now();
        let mut summary = RunSummary {
            started_at: Some(Utc::now()),
            strategy: self.config.strategy.to_string(),
            tasks: problems.len(),
            ..Default::default()
        };
        info!(
            tasks = problems.len(),
            strategy = %self.config.strategy,
            attempts_per_task = self.config.attempts_per_task,
            max_rounds = self.config.max_rounds,
            "Starting run"
        );

        let mut records = Vec::new();
        for (i, problem) in problems.iter().enumerate() {
            let mut completions = 0;
            for attempt in 1..=self.config.attempts_per_task {
                let report = self
                    .solver
                    .solve(self.config.strategy, problem, self.config.max_rounds)
                    .await;
                summary.record(&report);

                match report.candidate {
                    Some(candidate) => {
                        records.push(SampleRecord::new(
                            problem.task_id.clone(),
                            candidate.completion(),
                        ));
                        completions += 1;
                    }
                    None => warn!(
                        task_id = %problem.task_id,
                        attempt = attempt,
                        termination = report.termination.label(),
                        "Attempt produced no completion"
                    ),
                }
            }
            info!(
                task_id = %problem.task_id,
                "Task {}/{} | completions: {}",
                i + 1,
                problems.len(),
                completions
            );
        }

        summary.wall_time_secs = started.elapsed().as_secs_f64();
        info!(summary = %summary, "Run complete");
        RunOutput { records, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_terminations() {
        let mut summary = RunSummary::default();
        let mut report = SessionReport::new(crate::selfdebug::Strategy::SelfDebug);
        report.termination = Termination::Passed;
        report.candidate = Some(
            crate::structured::StructuredCandidate::new("r", "def f(): pass").unwrap(),
        );
        summary.record(&report);

        let mut empty = SessionReport::new(crate::selfdebug::Strategy::SelfDebug);
        empty.termination = Termination::GeneratorBreakdown;
        summary.record(&empty);

        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.completions, 1);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.broken_down, 1);
        assert!(summary.to_string().starts_with("0 tasks, 2 attempts, 1 completions"));
    }
}
