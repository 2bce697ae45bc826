//! Running a candidate against a problem's verification routine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::facility::{facility_from_config, ExecutionFacility, ExecutionJob, ExecutionReport};
use super::harness::{
    parse_verdict, HarnessMode, HarnessPayload, HarnessVerdict, VerdictStatus, HARNESS_SOURCE,
};
use crate::benchmark::ProblemSpec;
use crate::error::ExecutionError;
use crate::metrics::MetricsCollector;
use crate::pipeline::config::ExecutionConfig;
use crate::structured::StructuredCandidate;
use crate::utils::text::tail;

/// Diagnostic used when the code defines no function at all.
pub const NO_FUNCTION_DIAGNOSTIC: &str = "No function definition found in code.";

/// Result of running one candidate. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "diagnostic", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    /// `check(candidate)` failed an assertion.
    AssertionFailure(String),
    /// Definition error, other exception, timeout or facility failure.
    RuntimeFailure(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success)
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Success => None,
            ExecutionOutcome::AssertionFailure(d) | ExecutionOutcome::RuntimeFailure(d) => Some(d),
        }
    }

    /// Metric and log label.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success => "success",
            ExecutionOutcome::AssertionFailure(_) => "assertion_failure",
            ExecutionOutcome::RuntimeFailure(_) => "runtime_failure",
        }
    }
}

/// Picks the function to bind as `candidate`: the entry point when the code
/// defines it at top level, otherwise the first `def NAME(` anywhere.
///
/// Plain first-def binding would pick a helper such as `encode_shift` ahead
/// of the entry point `decode_shift`; checking the entry point first avoids
/// that.
pub fn binding_target(code: &str, entry_point: &str) -> Option<String> {
    let top_level = Regex::new(r"(?m)^def\s+([A-Za-z_]\w*)\s*\(").ok()?;
    if !entry_point.is_empty()
        && top_level
            .captures_iter(code)
            .any(|c| c.get(1).is_some_and(|m| m.as_str() == entry_point))
    {
        return Some(entry_point.to_string());
    }

    let any_def = Regex::new(r"def\s+([A-Za-z_]\w*)\s*\(").ok()?;
    any_def
        .captures(code)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Runs candidates through an [`ExecutionFacility`] and classifies the result.
#[derive(Clone)]
pub struct CandidateExecutor {
    facility: Arc<dyn ExecutionFacility>,
    timeout: Duration,
    traceback_frames: u32,
    max_diagnostic_chars: usize,
    prompt_prefix: bool,
    metrics: MetricsCollector,
}

impl CandidateExecutor {
    pub fn new(facility: Arc<dyn ExecutionFacility>, config: &ExecutionConfig) -> Self {
        Self {
            facility,
            timeout: config.timeout(),
            traceback_frames: config.traceback_frames,
            max_diagnostic_chars: config.max_diagnostic_chars,
            prompt_prefix: false,
            metrics: MetricsCollector::new(),
        }
    }

    /// Builds the facility named by `config` and wraps it.
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(Arc::from(facility_from_config(config)), config)
    }

    /// Overrides the per-job timeout (the scorer uses its own).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `problem.prompt` ahead of the code, the way HumanEval scoring
    /// assembles its programs. Prompts may define helpers that the tests or
    /// the completion call. The binding target is still chosen from the code.
    pub fn with_prompt_prefix(mut self) -> Self {
        self.prompt_prefix = true;
        self
    }

    pub fn facility_name(&self) -> &str {
        self.facility.name()
    }

    /// Executes a structured candidate.
    pub async fn execute(
        &self,
        candidate: &StructuredCandidate,
        problem: &ProblemSpec,
    ) -> ExecutionOutcome {
        self.execute_code(&candidate.code, problem).await
    }

    /// Executes raw code. Never fails: every path yields an outcome.
    pub async fn execute_code(&self, code: &str, problem: &ProblemSpec) -> ExecutionOutcome {
        let started = Instant::now();
        let outcome = self.classify(code, problem).await;
        let elapsed = started.elapsed().as_secs_f64();

        self.metrics.record_execution(outcome.label(), elapsed);
        debug!(
            task_id = %problem.task_id,
            facility = self.facility.name(),
            outcome = outcome.label(),
            duration_secs = elapsed,
            "Executed candidate"
        );
        outcome
    }

    async fn classify(&self, code: &str, problem: &ProblemSpec) -> ExecutionOutcome {
        let Some(function) = binding_target(code, &problem.entry_point) else {
            return ExecutionOutcome::RuntimeFailure(NO_FUNCTION_DIAGNOSTIC.to_string());
        };

        let verdict = match self
            .run_harness(HarnessMode::Check, code, problem, &function, Vec::new())
            .await
        {
            Ok(verdict) => verdict,
            Err(diagnostic) => return ExecutionOutcome::RuntimeFailure(diagnostic),
        };

        match verdict.status {
            VerdictStatus::Success => ExecutionOutcome::Success,
            VerdictStatus::AssertionFailure => {
                ExecutionOutcome::AssertionFailure(self.clip(&verdict.diagnostic))
            }
            VerdictStatus::RuntimeFailure
            | VerdictStatus::DefinitionError
            | VerdictStatus::Isolated
            | VerdictStatus::NotIsolated => {
                ExecutionOutcome::RuntimeFailure(self.clip(&verdict.diagnostic))
            }
        }
    }

    /// Runs the harness once and returns its verdict, or a clipped
    /// diagnostic describing why no verdict exists.
    pub(crate) async fn run_harness(
        &self,
        mode: HarnessMode,
        code: &str,
        problem: &ProblemSpec,
        function: &str,
        asserts: Vec<String>,
    ) -> Result<HarnessVerdict, String> {
        let nonce = format!("@@cot-bench-verdict-{}@@", Uuid::new_v4().simple());
        let payload = HarnessPayload {
            mode,
            code: self.program(code, problem),
            test: problem.test.clone(),
            function: function.to_string(),
            frames: self.traceback_frames,
            nonce: nonce.clone(),
            asserts,
        };
        let input = serde_json::to_string(&payload)
            .map_err(|e| self.clip(&ExecutionError::from(e).to_string()))?;

        let job = ExecutionJob {
            source: HARNESS_SOURCE.to_string(),
            input,
            timeout: self.timeout,
        };

        let report = self
            .facility
            .run(&job)
            .await
            .map_err(|e| self.clip(&format!("Execution facility error: {}", e)))?;

        if report.timed_out {
            return Err(format!(
                "Execution timed out after {:.1}s",
                self.timeout.as_secs_f64()
            ));
        }

        parse_verdict(&report.stdout, &nonce).ok_or_else(|| self.missing_verdict(&report))
    }

    fn program(&self, code: &str, problem: &ProblemSpec) -> String {
        if !self.prompt_prefix || problem.prompt.is_empty() {
            return code.to_string();
        }
        let separator = if problem.prompt.ends_with('\n') { "" } else { "\n" };
        format!("{}{}{}", problem.prompt, separator, code)
    }

    fn missing_verdict(&self, report: &ExecutionReport) -> String {
        let exit = report
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        self.clip(&format!(
            "Harness produced no verdict (exit code {}).\n{}",
            exit,
            report.stderr.trim()
        ))
    }

    /// Keeps the tail of long diagnostics; the exception line is at the end.
    fn clip(&self, diagnostic: &str) -> String {
        let diagnostic = diagnostic.trim_end();
        if diagnostic.len() <= self.max_diagnostic_chars {
            diagnostic.to_string()
        } else {
            format!("... [truncated]\n{}", tail(diagnostic, self.max_diagnostic_chars))
        }
    }
}

impl std::fmt::Debug for CandidateExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateExecutor")
            .field("facility", &self.facility.name())
            .field("timeout", &self.timeout)
            .field("traceback_frames", &self.traceback_frames)
            .field("prompt_prefix", &self.prompt_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Facility that answers with a scripted report and records the payload.
    struct ScriptedFacility {
        respond: Box<dyn Fn(&HarnessPayload) -> Result<ExecutionReport, ExecutionError> + Send + Sync>,
        payloads: Mutex<Vec<HarnessPayload>>,
    }

    impl ScriptedFacility {
        fn verdict(status: &'static str, diagnostic: impl Into<String>) -> Self {
            let diagnostic: String = diagnostic.into();
            Self {
                respond: Box::new(move |payload| {
                    Ok(ExecutionReport {
                        exit_code: Some(0),
                        stdout: format!(
                            "noise\n{}{}\n",
                            payload.nonce,
                            serde_json::json!({"status": status, "diagnostic": diagnostic})
                        ),
                        ..ExecutionReport::default()
                    })
                }),
                payloads: Mutex::new(Vec::new()),
            }
        }

        fn report(report: ExecutionReport) -> Self {
            Self {
                respond: Box::new(move |_| Ok(report.clone())),
                payloads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExecutionFacility for ScriptedFacility {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&self, job: &ExecutionJob) -> Result<ExecutionReport, ExecutionError> {
            let payload: HarnessPayload = serde_json::from_str(&job.input)?;
            let result = (self.respond)(&payload);
            self.payloads.lock().unwrap().push(payload);
            result
        }
    }

    fn problem() -> ProblemSpec {
        ProblemSpec::new(
            "HumanEval/0",
            "def inc(x):\n",
            "def check(candidate):\n    assert candidate(1) == 2\n",
            "inc",
        )
    }

    fn executor(facility: Arc<ScriptedFacility>) -> CandidateExecutor {
        CandidateExecutor::new(facility, &ExecutionConfig::default())
    }

    #[test]
    fn test_binding_prefers_entry_point() {
        let code = "def helper(x):\n    return x\n\ndef inc(x):\n    return helper(x) + 1\n";
        assert_eq!(binding_target(code, "inc").as_deref(), Some("inc"));
    }

    #[test]
    fn test_binding_falls_back_to_first_def() {
        let code = "def add_one(x):\n    return x + 1\n";
        assert_eq!(binding_target(code, "inc").as_deref(), Some("add_one"));
        // A nested def named like the entry point does not count as top level.
        let code = "def outer():\n    def inc(x):\n        return x\n    return inc\n";
        assert_eq!(binding_target(code, "inc").as_deref(), Some("outer"));
    }

    #[test]
    fn test_binding_none_without_def() {
        assert_eq!(binding_target("x = lambda y: y", "inc"), None);
    }

    #[test]
    fn test_outcome_labels_and_serde() {
        let outcome = ExecutionOutcome::AssertionFailure("boom".to_string());
        assert_eq!(outcome.label(), "assertion_failure");
        assert_eq!(outcome.diagnostic(), Some("boom"));
        assert!(!outcome.is_success());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "assertion_failure");
        assert_eq!(json["diagnostic"], "boom");
        assert!(ExecutionOutcome::Success.diagnostic().is_none());
    }

    #[tokio::test]
    async fn test_success_verdict() {
        let facility = Arc::new(ScriptedFacility::verdict("success", ""));
        let outcome = executor(facility.clone())
            .execute_code("def inc(x):\n    return x + 1", &problem())
            .await;
        assert_eq!(outcome, ExecutionOutcome::Success);

        let payloads = facility.payloads.lock().unwrap();
        assert_eq!(payloads[0].function, "inc");
        assert_eq!(payloads[0].frames, 5);
        assert_eq!(payloads[0].mode, HarnessMode::Check);
    }

    #[tokio::test]
    async fn test_code_runs_alone_by_default() {
        let facility = Arc::new(ScriptedFacility::verdict("success", ""));
        executor(facility.clone())
            .execute_code("def inc(x):\n    return x + 1", &problem())
            .await;
        assert_eq!(
            facility.payloads.lock().unwrap()[0].code,
            "def inc(x):\n    return x + 1"
        );
    }

    #[tokio::test]
    async fn test_prompt_prefix_keeps_prompt_helpers() {
        let problem = ProblemSpec::new(
            "HumanEval/50",
            "def encode_shift(s: str):\n    return ''.join(chr(ord(c) + 5) for c in s)\n\n\ndef decode_shift(s: str):\n    \"\"\" Decode. \"\"\"",
            "def check(candidate):\n    assert candidate(encode_shift('abc')) == 'abc'\n",
            "decode_shift",
        );
        let code = "def decode_shift(s: str):\n    return ''.join(chr(ord(c) - 5) for c in s)\n";
        let facility = Arc::new(ScriptedFacility::verdict("success", ""));
        let outcome = executor(facility.clone())
            .with_prompt_prefix()
            .execute_code(code, &problem)
            .await;
        assert_eq!(outcome, ExecutionOutcome::Success);

        let payloads = facility.payloads.lock().unwrap();
        assert!(payloads[0].code.starts_with("def encode_shift(s: str):"));
        assert!(payloads[0].code.ends_with(&format!("\"\"\" Decode. \"\"\"\n{}", code)));
        assert_eq!(payloads[0].function, "decode_shift");
    }

    #[tokio::test]
    async fn test_assertion_verdict() {
        let facility = Arc::new(ScriptedFacility::verdict("assertion_failure", "AssertionError"));
        let outcome = executor(facility)
            .execute_code("def inc(x):\n    return x", &problem())
            .await;
        assert_eq!(
            outcome,
            ExecutionOutcome::AssertionFailure("AssertionError".to_string())
        );
    }

    #[tokio::test]
    async fn test_definition_error_is_runtime_failure() {
        let facility = Arc::new(ScriptedFacility::verdict(
            "definition_error",
            "SyntaxError: invalid syntax",
        ));
        let outcome = executor(facility)
            .execute_code("def inc(x) return x", &problem())
            .await;
        assert!(matches!(outcome, ExecutionOutcome::RuntimeFailure(d) if d.contains("SyntaxError")));
    }

    #[tokio::test]
    async fn test_no_def_never_reaches_facility() {
        let facility = Arc::new(ScriptedFacility::verdict("success", ""));
        let outcome = executor(facility.clone())
            .execute_code("return 1", &problem())
            .await;
        assert_eq!(
            outcome,
            ExecutionOutcome::RuntimeFailure(NO_FUNCTION_DIAGNOSTIC.to_string())
        );
        assert!(facility.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_runtime_failure() {
        let facility = Arc::new(ScriptedFacility::report(ExecutionReport {
            timed_out: true,
            ..ExecutionReport::default()
        }));
        let outcome = executor(facility)
            .execute_code("def inc(x):\n    while True: pass", &problem())
            .await;
        assert!(matches!(outcome, ExecutionOutcome::RuntimeFailure(d) if d.contains("timed out")));
    }

    #[tokio::test]
    async fn test_missing_verdict_reports_stderr_tail() {
        let facility = Arc::new(ScriptedFacility::report(ExecutionReport {
            exit_code: Some(137),
            stderr: "Killed\n".to_string(),
            ..ExecutionReport::default()
        }));
        let outcome = executor(facility)
            .execute_code("def inc(x):\n    return x", &problem())
            .await;
        match outcome {
            ExecutionOutcome::RuntimeFailure(d) => {
                assert!(d.contains("exit code 137"));
                assert!(d.ends_with("Killed"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forged_verdict_without_nonce_is_ignored() {
        let facility = Arc::new(ScriptedFacility::report(ExecutionReport {
            exit_code: Some(0),
            stdout: "{\"status\": \"success\"}\n".to_string(),
            ..ExecutionReport::default()
        }));
        let outcome = executor(facility)
            .execute_code("def inc(x):\n    print('{\"status\": \"success\"}')", &problem())
            .await;
        assert!(matches!(outcome, ExecutionOutcome::RuntimeFailure(_)));
    }

    #[tokio::test]
    async fn test_facility_error_is_runtime_failure() {
        let facility = Arc::new(ScriptedFacility {
            respond: Box::new(|_| {
                Err(ExecutionError::SpawnFailed {
                    program: "python3".to_string(),
                    reason: "not found".to_string(),
                })
            }),
            payloads: Mutex::new(Vec::new()),
        });
        let outcome = executor(facility)
            .execute_code("def inc(x):\n    return x", &problem())
            .await;
        assert!(
            matches!(outcome, ExecutionOutcome::RuntimeFailure(d) if d.contains("Execution facility error"))
        );
    }

    #[tokio::test]
    async fn test_long_diagnostic_keeps_tail() {
        let config = ExecutionConfig {
            max_diagnostic_chars: 20,
            ..ExecutionConfig::default()
        };
        let long = "Traceback line\n".repeat(10) + "AssertionError: last";
        let facility = Arc::new(ScriptedFacility::verdict("assertion_failure", long));
        let outcome = CandidateExecutor::new(facility, &config)
            .execute_code("def inc(x):\n    return x", &problem())
            .await;
        let d = outcome.diagnostic().unwrap();
        assert!(d.starts_with("... [truncated]"));
        assert!(d.ends_with("AssertionError: last"));
    }
}
