//! The self-debug repair loop.
//!
//! ```text
//!   Init ──NotProduced──▶ GeneratorBreakdown (no candidate)
//!    │
//!    ▼
//!   Round n: execute ──Success──▶ Passed (current candidate)
//!    │ failure
//!    ▼
//!   repair prompt(previous candidate, its diagnostic) ──NotProduced──▶ GeneratorBreakdown (last candidate)
//!    │ new candidate
//!    ▼
//!   n < max_rounds ? Round n+1 : Exhausted (last candidate, unverified)
//! ```
//!
//! Each repair prompt sees only the immediately preceding candidate and its
//! own failure.

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::strategies::{Solver, Strategy};
use crate::benchmark::ProblemSpec;
use crate::execution::ExecutionOutcome;
use crate::metrics::MetricsCollector;
use crate::prompts::{build_cot_prompt, build_debug_prompt};
use crate::structured::StructuredCandidate;

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A candidate passed the verification routine.
    Passed,
    /// The round budget ran out; the last candidate is returned unverified.
    Exhausted,
    /// The generator produced nothing; the last candidate, if any, is returned.
    GeneratorBreakdown,
    /// The strategy does not execute candidates.
    Unverified,
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Passed => "passed",
            Termination::Exhausted => "exhausted",
            Termination::GeneratorBreakdown => "generator_breakdown",
            Termination::Unverified => "unverified",
        }
    }
}

/// Result of one attempt at one problem.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub strategy: Strategy,
    pub termination: Termination,
    /// Executor round-trips performed.
    pub rounds: u32,
    /// Structured generations requested (each may use several model calls).
    pub generator_calls: u32,
    /// Surviving candidate. Not guaranteed to pass unless `termination` is `Passed`.
    pub candidate: Option<StructuredCandidate>,
    pub last_outcome: Option<ExecutionOutcome>,
}

impl SessionReport {
    pub(crate) fn new(strategy: Strategy) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            strategy,
            termination: Termination::Unverified,
            rounds: 0,
            generator_calls: 0,
            candidate: None,
            last_outcome: None,
        }
    }

    pub(crate) fn finish(
        mut self,
        termination: Termination,
        candidate: Option<StructuredCandidate>,
    ) -> Self {
        self.termination = termination;
        self.candidate = candidate;
        MetricsCollector::new().record_session(termination.label(), self.rounds);
        self
    }

    pub fn passed(&self) -> bool {
        self.termination == Termination::Passed
    }
}

/// Per-attempt mutable state of the loop.
#[derive(Debug)]
pub struct DebugSession<'a> {
    problem: &'a ProblemSpec,
    max_rounds: u32,
    round: u32,
    candidate: Option<StructuredCandidate>,
    outcome: Option<ExecutionOutcome>,
    terminal: bool,
    report: SessionReport,
}

impl<'a> DebugSession<'a> {
    pub fn new(problem: &'a ProblemSpec, max_rounds: u32) -> Self {
        Self {
            problem,
            max_rounds,
            round: 0,
            candidate: None,
            outcome: None,
            terminal: false,
            report: SessionReport::new(Strategy::SelfDebug),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn candidate(&self) -> Option<&StructuredCandidate> {
        self.candidate.as_ref()
    }

    pub fn outcome(&self) -> Option<&ExecutionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Whether another round may start.
    pub fn has_rounds_left(&self) -> bool {
        !self.terminal && self.candidate.is_some() && self.round < self.max_rounds
    }

    fn replace_candidate(&mut self, candidate: StructuredCandidate) {
        self.candidate = Some(candidate);
    }

    fn begin_round(&mut self) -> u32 {
        self.round += 1;
        self.report.rounds = self.round;
        self.round
    }

    fn record_outcome(&mut self, outcome: ExecutionOutcome) {
        self.report.last_outcome = Some(outcome.clone());
        self.outcome = Some(outcome);
    }

    fn finish(mut self, termination: Termination) -> SessionReport {
        self.terminal = true;
        let candidate = self.candidate.take();
        self.report.finish(termination, candidate)
    }
}

impl Solver {
    /// Generate, execute, and repair from execution feedback for at most
    /// `max_rounds` rounds.
    ///
    /// Returns on the first passing round. When the round budget runs out,
    /// or the generator breaks down mid-loop, the last successfully produced
    /// candidate is returned unverified. Only a breakdown before the first
    /// candidate yields no candidate.
    #[instrument(skip(self, problem), fields(task_id = %problem.task_id))]
    pub async fn solve_with_self_debug(
        &self,
        problem: &ProblemSpec,
        max_rounds: u32,
    ) -> SessionReport {
        let mut session = DebugSession::new(problem, max_rounds);

        session.report.generator_calls += 1;
        match self
            .generator
            .generate_structured(&build_cot_prompt(&problem.prompt))
            .await
        {
            Ok(candidate) => session.replace_candidate(candidate),
            Err(e) => {
                warn!(error = %e, "No initial candidate, giving up on this attempt");
                return session.finish(Termination::GeneratorBreakdown);
            }
        }

        while session.has_rounds_left() {
            let round = session.begin_round();
            let Some(current) = session.candidate.clone() else {
                break;
            };

            let outcome = self.executor.execute(&current, session.problem).await;
            if outcome.is_success() {
                info!(round = round, "Passed after {} round(s)", round);
                session.record_outcome(outcome);
                return session.finish(Termination::Passed);
            }

            let diagnostic = outcome.diagnostic().unwrap_or_default().to_string();
            warn!(
                round = round,
                outcome = outcome.label(),
                diagnostic = %diagnostic,
                "Round failed"
            );
            session.record_outcome(outcome);

            let repair = build_debug_prompt(&problem.prompt, &current.to_json(), &diagnostic);
            session.report.generator_calls += 1;
            match self.generator.generate_structured(&repair).await {
                Ok(fixed) => session.replace_candidate(fixed),
                Err(e) => {
                    warn!(round = round, error = %e, "Failed to parse fixed JSON, stopping");
                    return session.finish(Termination::GeneratorBreakdown);
                }
            }
        }

        session.finish(Termination::Exhausted)
    }
}
