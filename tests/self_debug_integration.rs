//! End-to-end tests of the solve loop with a scripted model and a scripted
//! execution facility.
//!
//! Tests that need a real `python3` are ignored by default:
//! cargo test --test self_debug_integration -- --ignored

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cot_bench::benchmark::{Benchmark, ProblemSpec};
use cot_bench::export::SampleRecord;
use cot_bench::execution::{
    CandidateExecutor, ExecutionFacility, ExecutionJob, ExecutionOutcome, ExecutionReport,
    HarnessPayload, SubprocessFacility,
};
use cot_bench::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use cot_bench::pipeline::{ExecutionConfig, RunConfig, RunDriver, SamplingConfig};
use cot_bench::scoring::{LocalScorer, Scorer};
use cot_bench::selfdebug::{Solver, Strategy, Termination};
use cot_bench::structured::{StructuredCandidate, StructuredGenerator};
use cot_bench::{ExecutionError, LlmError};

// ----------------------------------------------------------------------------
// Scripted model
// ----------------------------------------------------------------------------

struct MockLlmProvider {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmProvider {
    fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn candidates(codes: &[&str]) -> Self {
        Self::new(codes.iter().map(|code| Ok(candidate_json(code))).collect())
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::RequestFailed("script exhausted".to_string())))?;
        Ok(GenerationResponse {
            id: "mock".to_string(),
            model: "mock".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

fn candidate_json(code: &str) -> String {
    serde_json::json!({"reasoning": "Think step by step.", "code": code}).to_string()
}

// ----------------------------------------------------------------------------
// Scripted facility
// ----------------------------------------------------------------------------

/// Answers with a verdict chosen by the first marker found in the code.
struct ScriptedFacility {
    rules: Vec<(&'static str, &'static str, &'static str)>,
    runs: Mutex<Vec<String>>,
}

impl ScriptedFacility {
    fn new(rules: Vec<(&'static str, &'static str, &'static str)>) -> Arc<Self> {
        Arc::new(Self {
            rules,
            runs: Mutex::new(Vec::new()),
        })
    }

    fn runs(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionFacility for ScriptedFacility {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, job: &ExecutionJob) -> Result<ExecutionReport, ExecutionError> {
        let payload: HarnessPayload = serde_json::from_str(&job.input)?;
        self.runs.lock().unwrap().push(payload.code.clone());
        let (status, diagnostic) = self
            .rules
            .iter()
            .find(|(marker, _, _)| payload.code.contains(marker))
            .map(|(_, status, diagnostic)| (*status, *diagnostic))
            .unwrap_or(("success", ""));
        Ok(ExecutionReport {
            exit_code: Some(0),
            stdout: format!(
                "\n{}{}\n",
                payload.nonce,
                serde_json::json!({"status": status, "diagnostic": diagnostic})
            ),
            ..Default::default()
        })
    }
}

fn problem() -> ProblemSpec {
    ProblemSpec::new(
        "HumanEval/0",
        "def f(x):\n    \"\"\" Return x plus one. \"\"\"\n",
        "def check(candidate):\n    assert candidate(1) == 2\n",
        "f",
    )
}

fn solver(provider: Arc<MockLlmProvider>, facility: Arc<ScriptedFacility>) -> Solver {
    let generator = Arc::new(StructuredGenerator::new(provider, SamplingConfig::default()));
    let executor = CandidateExecutor::new(facility, &ExecutionConfig::default());
    Solver::new(generator, executor)
}

// ----------------------------------------------------------------------------
// Self-debug scenarios
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_passing_candidate_returns_on_round_one() {
    let provider = Arc::new(MockLlmProvider::candidates(&["def f(x): return x+1"]));
    let facility = ScriptedFacility::new(vec![]);
    let report = solver(provider.clone(), facility.clone())
        .solve(Strategy::SelfDebug, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::Passed);
    assert_eq!(report.rounds, 1);
    assert_eq!(report.generator_calls, 1);
    assert_eq!(provider.calls(), 1);
    assert_eq!(facility.runs(), 1);
    assert_eq!(report.last_outcome, Some(ExecutionOutcome::Success));
    assert_eq!(
        report.candidate.map(|c| c.completion()),
        Some("def f(x): return x+1\n".to_string())
    );
}

#[tokio::test]
async fn test_code_without_def_never_reaches_executor() {
    let provider = Arc::new(MockLlmProvider::candidates(&[
        "return x + 1",
        "x = 1",
        "lambda x: x + 1",
    ]));
    let facility = ScriptedFacility::new(vec![]);
    let report = solver(provider.clone(), facility.clone())
        .solve(Strategy::SelfDebug, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::GeneratorBreakdown);
    assert!(report.candidate.is_none());
    assert_eq!(provider.calls(), 3);
    assert_eq!(facility.runs(), 0);
}

#[tokio::test]
async fn test_runtime_failure_is_fed_back_for_repair() {
    let provider = Arc::new(MockLlmProvider::candidates(&[
        "def f(x):\n    return [][x]",
        "def f(x):\n    return x + 1",
    ]));
    let facility = ScriptedFacility::new(vec![(
        "[][x]",
        "runtime_failure",
        "Traceback (most recent call last):\nIndexError: list index out of range",
    )]);
    let report = solver(provider.clone(), facility.clone())
        .solve(Strategy::SelfDebug, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::Passed);
    assert_eq!(report.rounds, 2);
    assert_eq!(facility.runs(), 2);

    let repair = provider.prompt(1);
    assert!(repair.contains("IndexError: list index out of range"));
    assert!(repair.contains("return [][x]"));
}

#[tokio::test]
async fn test_generator_breakdown_before_first_round_returns_none() {
    let provider = Arc::new(MockLlmProvider::new(vec![
        Err(LlmError::RequestFailed("connection refused".to_string())),
        Ok("not json at all".to_string()),
        Ok("{\"reasoning\": \"r\"}".to_string()),
    ]));
    let facility = ScriptedFacility::new(vec![]);
    let report = solver(provider.clone(), facility.clone())
        .solve(Strategy::SelfDebug, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::GeneratorBreakdown);
    assert!(report.candidate.is_none());
    assert_eq!(report.rounds, 0);
    assert_eq!(facility.runs(), 0);
}

#[tokio::test]
async fn test_exhausted_rounds_return_last_candidate() {
    let provider = Arc::new(MockLlmProvider::candidates(&[
        "def f(x):\n    return x  # v1",
        "def f(x):\n    return x  # v2",
        "def f(x):\n    return x  # v3",
        "def f(x):\n    return x  # v4",
    ]));
    let facility = ScriptedFacility::new(vec![
        ("# v1", "assertion_failure", "AssertionError: first miss"),
        ("# v2", "assertion_failure", "AssertionError: second miss"),
        ("# v3", "assertion_failure", "AssertionError: third miss"),
    ]);
    let report = solver(provider.clone(), facility.clone())
        .solve(Strategy::SelfDebug, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.rounds, 3);
    assert_eq!(facility.runs(), 3);
    assert_eq!(provider.calls(), 4);
    assert!(matches!(
        report.last_outcome,
        Some(ExecutionOutcome::AssertionFailure(_))
    ));
    let candidate = report.candidate.expect("best-effort candidate");
    assert!(candidate.code.ends_with("# v4"));

    // Each repair prompt carries only the previous candidate and its own failure.
    let last_repair = provider.prompt(3);
    assert!(last_repair.contains("# v3"));
    assert!(last_repair.contains("third miss"));
    for stale in ["# v1", "# v2", "first miss", "second miss"] {
        assert!(!last_repair.contains(stale), "repair prompt leaked {:?}", stale);
    }
    let first_repair = provider.prompt(1);
    assert!(first_repair.contains("# v1") && first_repair.contains("first miss"));
    assert!(!first_repair.contains("# v2"));
}

#[tokio::test]
async fn test_breakdown_mid_loop_keeps_last_candidate() {
    let provider = Arc::new(MockLlmProvider::new(vec![
        Ok(candidate_json("def f(x):\n    return x")),
        Ok("garbage".to_string()),
        Ok("garbage".to_string()),
        Ok("garbage".to_string()),
    ]));
    let facility = ScriptedFacility::new(vec![("return x", "assertion_failure", "AssertionError")]);
    let report = solver(provider, facility.clone())
        .solve(Strategy::SelfDebug, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::GeneratorBreakdown);
    assert_eq!(report.rounds, 1);
    assert_eq!(facility.runs(), 1);
    assert_eq!(
        report.candidate.map(|c| c.code),
        Some("def f(x):\n    return x".to_string())
    );
}

#[tokio::test]
async fn test_repaired_output_is_accepted() {
    let raw = r#"Here you go:
{"reasoning": "r", "code": "def f(x):\n    """Add one."""\n    return x + 1"}"#;
    let provider = Arc::new(MockLlmProvider::new(vec![Ok(raw.to_string())]));
    let facility = ScriptedFacility::new(vec![]);
    let report = solver(provider.clone(), facility)
        .solve(Strategy::SelfDebug, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::Passed);
    assert_eq!(provider.calls(), 1);
}

// ----------------------------------------------------------------------------
// Other strategies
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_chain_of_thought_never_executes() {
    let provider = Arc::new(MockLlmProvider::candidates(&["def f(x): return x"]));
    let facility = ScriptedFacility::new(vec![]);
    let report = solver(provider, facility.clone())
        .solve(Strategy::ChainOfThought, &problem(), 3)
        .await;

    assert_eq!(report.termination, Termination::Unverified);
    assert!(report.candidate.is_some());
    assert_eq!(facility.runs(), 0);
}

#[tokio::test]
async fn test_self_edit_prefers_reviewed_candidate() {
    let provider = Arc::new(MockLlmProvider::candidates(&[
        "def f(x): return x",
        "def f(x): return x + 1",
    ]));
    let facility = ScriptedFacility::new(vec![]);
    let report = solver(provider.clone(), facility)
        .solve(Strategy::SelfEdit, &problem(), 3)
        .await;

    assert_eq!(report.generator_calls, 2);
    assert_eq!(
        report.candidate.map(|c| c.code),
        Some("def f(x): return x + 1".to_string())
    );
    assert!(provider.prompt(1).contains("def f(x): return x"));
}

// ----------------------------------------------------------------------------
// Run driver
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_driver_survives_tasks_without_completions() {
    let benchmark = Benchmark::new(vec![
        ProblemSpec::new("HumanEval/0", "def f(x):\n", "def check(candidate): pass\n", "f"),
        ProblemSpec::new("HumanEval/1", "def g(x):\n", "def check(candidate): pass\n", "g"),
    ]);

    // Task 0 gets two passing candidates; every call for task 1 fails.
    let mut script: Vec<Result<String, LlmError>> = vec![
        Ok(candidate_json("def f(x): return 1")),
        Ok(candidate_json("def f(x): return 2")),
    ];
    script.extend((0..6).map(|_| Err(LlmError::RateLimited("slow down".to_string()))));
    let provider = Arc::new(MockLlmProvider::new(script));
    let facility = ScriptedFacility::new(vec![]);

    let config = RunConfig {
        attempts_per_task: 2,
        sample_step: 1,
        ..RunConfig::default()
    };
    let driver = RunDriver::new(solver(provider, facility), config);
    let output = driver.run(&benchmark).await;

    assert_eq!(output.records.len(), 2);
    assert!(output.records.iter().all(|r| r.task_id == "HumanEval/0"));
    assert_eq!(output.records[0].completion, "def f(x): return 1\n");
    assert_eq!(output.summary.tasks, 2);
    assert_eq!(output.summary.attempts, 4);
    assert_eq!(output.summary.passed, 2);
    assert_eq!(output.summary.broken_down, 2);
    assert!(output.summary.started_at.is_some());
}

// ----------------------------------------------------------------------------
// Real interpreter
// ----------------------------------------------------------------------------

fn python_executor() -> CandidateExecutor {
    let config = ExecutionConfig::default();
    CandidateExecutor::new(Arc::new(SubprocessFacility::default()), &config)
        .with_timeout(Duration::from_secs(5))
}

fn candidate(code: &str) -> StructuredCandidate {
    StructuredCandidate::new("r", code).unwrap()
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_passing_candidate() {
    let outcome = python_executor()
        .execute(&candidate("def f(x):\n    return x + 1\n"), &problem())
        .await;
    assert_eq!(outcome, ExecutionOutcome::Success);

    // Same candidate, same problem, same verdict.
    let again = python_executor()
        .execute(&candidate("def f(x):\n    return x + 1\n"), &problem())
        .await;
    assert_eq!(again, ExecutionOutcome::Success);
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_failures_are_classified() {
    let executor = python_executor();

    let wrong = executor
        .execute(&candidate("def f(x):\n    return x\n"), &problem())
        .await;
    assert!(matches!(wrong, ExecutionOutcome::AssertionFailure(_)));

    let raises = executor
        .execute(&candidate("def f(x):\n    return [][x]\n"), &problem())
        .await;
    match raises {
        ExecutionOutcome::RuntimeFailure(d) => assert!(d.contains("IndexError")),
        other => panic!("expected runtime failure, got {:?}", other),
    }

    let syntax = executor
        .execute(&candidate("def f(x):\n    return (x +\n"), &problem())
        .await;
    match syntax {
        ExecutionOutcome::RuntimeFailure(d) => assert!(d.contains("SyntaxError")),
        other => panic!("expected runtime failure, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_timeout_is_runtime_failure() {
    let executor = python_executor().with_timeout(Duration::from_secs(1));
    let outcome = executor
        .execute(&candidate("def f(x):\n    while True:\n        pass\n"), &problem())
        .await;
    match outcome {
        ExecutionOutcome::RuntimeFailure(d) => assert!(d.contains("timed out")),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_triage_isolates_assertion() {
    let problem = ProblemSpec::new(
        "HumanEval/0",
        "def f(x):\n",
        "def check(candidate):\n    assert candidate(0) == 0\n    assert candidate(1) == 2\n",
        "f",
    );
    let report = python_executor()
        .triage("def f(x):\n    return x\n", &problem)
        .await;
    let failing = report.failing.expect("isolated assertion");
    assert_eq!(failing.number, 2);
    assert_eq!(failing.line, "assert candidate(1) == 2");
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_scoring_sees_prompt_helpers() {
    let problem = ProblemSpec::new(
        "HumanEval/50",
        "def encode_shift(s: str):\n    return ''.join([chr(((ord(ch) + 5 - ord('a')) % 26) + ord('a')) for ch in s])\n\n\ndef decode_shift(s: str):\n    \"\"\"\n    takes as input string encoded with encode_shift function. Returns decoded string.\n    \"\"\"\n",
        "def check(candidate):\n    for s in ['abc', 'hello', 'zzz']:\n        assert candidate(encode_shift(s)) == s\n",
        "decode_shift",
    );
    let completion = "def decode_shift(s: str):\n    return ''.join([chr(((ord(ch) - 5 - ord('a')) % 26) + ord('a')) for ch in s])\n";

    // Run alone, the test cannot see `encode_shift`.
    let alone = python_executor().execute_code(completion, &problem).await;
    assert!(matches!(alone, ExecutionOutcome::RuntimeFailure(d) if d.contains("encode_shift")));

    let scorer = LocalScorer::new(Benchmark::new(vec![problem]), python_executor());
    let summary = scorer
        .score(
            &[SampleRecord::new("HumanEval/50", completion)],
            &[1],
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(summary.get(1), Some(1.0));
}
