//! Failure triage: find which assertion of a verification routine a failing
//! candidate trips first.

use serde::Serialize;

use super::executor::{binding_target, CandidateExecutor, ExecutionOutcome};
use super::harness::{HarnessMode, VerdictStatus};
use crate::benchmark::ProblemSpec;

/// One assertion that failed when run on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailingAssertion {
    /// 1-based position among the routine's assertion lines.
    pub number: usize,
    pub line: String,
}

/// Everything triage learned about one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct TriageReport {
    pub task_id: String,
    pub outcome: ExecutionOutcome,
    /// Assertion lines of the verification routine, in order.
    pub assertions: Vec<String>,
    /// Set only for assertion failures that could be isolated.
    pub failing: Option<FailingAssertion>,
}

impl TriageReport {
    /// Human-readable summary for the CLI.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.outcome {
            ExecutionOutcome::Success => {
                out.push_str("All asserts passed locally.\n");
                return out;
            }
            ExecutionOutcome::AssertionFailure(d) => {
                out.push_str("Assertion failed!\n\n");
                out.push_str(d);
                out.push('\n');
            }
            ExecutionOutcome::RuntimeFailure(d) => {
                out.push_str("Exception raised during tests:\n\n");
                out.push_str(d);
                out.push('\n');
                return out;
            }
        }

        out.push_str("\nAll test cases for this task:\n\n");
        for (i, line) in self.assertions.iter().enumerate() {
            out.push_str(&format!("{:2}: {}\n", i + 1, line));
        }
        out.push('\n');
        match &self.failing {
            Some(f) => out.push_str(&format!("Failed assertion #{}: {}\n", f.number, f.line)),
            None => out.push_str("Could not isolate the exact failing assert.\n"),
        }
        out
    }
}

impl CandidateExecutor {
    /// Executes `code`; on an assertion failure, re-runs each assertion line
    /// on its own to isolate the first one that fails.
    pub async fn triage(&self, code: &str, problem: &ProblemSpec) -> TriageReport {
        let outcome = self.execute_code(code, problem).await;
        let assertions: Vec<String> = problem
            .assert_lines()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut report = TriageReport {
            task_id: problem.task_id.clone(),
            outcome,
            assertions,
            failing: None,
        };

        if !matches!(report.outcome, ExecutionOutcome::AssertionFailure(_))
            || report.assertions.is_empty()
        {
            return report;
        }
        let Some(function) = binding_target(code, &problem.entry_point) else {
            return report;
        };

        match self
            .run_harness(
                HarnessMode::Triage,
                code,
                problem,
                &function,
                report.assertions.clone(),
            )
            .await
        {
            Ok(verdict) if verdict.status == VerdictStatus::Isolated => {
                report.failing = verdict.index.and_then(|i| {
                    report.assertions.get(i).map(|line| FailingAssertion {
                        number: i + 1,
                        line: line.clone(),
                    })
                });
            }
            Ok(_) => {}
            Err(diagnostic) => {
                tracing::warn!(task_id = %problem.task_id, diagnostic = %diagnostic, "Triage run failed");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::execution::facility::{ExecutionFacility, ExecutionJob, ExecutionReport};
    use crate::execution::harness::HarnessPayload;
    use crate::pipeline::config::ExecutionConfig;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Fails `check` with an assertion and, in triage mode, blames assertion #2.
    struct BlameSecond;

    #[async_trait]
    impl ExecutionFacility for BlameSecond {
        fn name(&self) -> &str {
            "blame-second"
        }

        async fn run(&self, job: &ExecutionJob) -> Result<ExecutionReport, ExecutionError> {
            let payload: HarnessPayload = serde_json::from_str(&job.input)?;
            let verdict = match payload.mode {
                HarnessMode::Check => {
                    serde_json::json!({"status": "assertion_failure", "diagnostic": "AssertionError"})
                }
                HarnessMode::Triage => {
                    assert_eq!(payload.asserts.len(), 3);
                    serde_json::json!({"status": "isolated", "diagnostic": "", "index": 1})
                }
            };
            Ok(ExecutionReport {
                exit_code: Some(0),
                stdout: format!("{}{}\n", payload.nonce, verdict),
                ..ExecutionReport::default()
            })
        }
    }

    fn problem() -> ProblemSpec {
        ProblemSpec::new(
            "HumanEval/20",
            "",
            "def check(candidate):\n    assert candidate(1) == 1\n    assert candidate(2) == 4\n    assert candidate(3) == 9\n",
            "square",
        )
    }

    #[tokio::test]
    async fn test_triage_isolates_failing_assertion() {
        let executor = CandidateExecutor::new(Arc::new(BlameSecond), &ExecutionConfig::default());
        let report = executor
            .triage("def square(x):\n    return x", &problem())
            .await;

        assert_eq!(report.assertions.len(), 3);
        assert_eq!(
            report.failing,
            Some(FailingAssertion {
                number: 2,
                line: "assert candidate(2) == 4".to_string()
            })
        );
        let text = report.render();
        assert!(text.contains(" 2: assert candidate(2) == 4"));
        assert!(text.contains("Failed assertion #2"));
    }

    #[test]
    fn test_render_success_and_runtime() {
        let report = TriageReport {
            task_id: "HumanEval/0".to_string(),
            outcome: ExecutionOutcome::Success,
            assertions: vec![],
            failing: None,
        };
        assert!(report.render().contains("All asserts passed"));

        let report = TriageReport {
            outcome: ExecutionOutcome::RuntimeFailure("IndexError".to_string()),
            ..report
        };
        let text = report.render();
        assert!(text.contains("Exception raised"));
        assert!(!text.contains("All test cases"));
    }

    #[test]
    fn test_render_not_isolated() {
        let report = TriageReport {
            task_id: "HumanEval/0".to_string(),
            outcome: ExecutionOutcome::AssertionFailure("AssertionError".to_string()),
            assertions: vec!["assert candidate() == 1".to_string()],
            failing: None,
        };
        assert!(report.render().contains("Could not isolate"));
    }
}
