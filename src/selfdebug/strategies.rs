//! Generation strategies and the [`Solver`] that runs them.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::session::{SessionReport, Termination};
use crate::benchmark::ProblemSpec;
use crate::execution::CandidateExecutor;
use crate::prompts::{build_cot_prompt, build_reflection_prompt};
use crate::structured::StructuredGenerator;

/// How one attempt at a problem is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One structured generation.
    #[serde(alias = "cot")]
    ChainOfThought,
    /// Generate, then have the model review its own answer.
    SelfEdit,
    /// Generate, execute, and repair from execution feedback.
    #[default]
    SelfDebug,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ChainOfThought => "chain_of_thought",
            Strategy::SelfEdit => "self_edit",
            Strategy::SelfDebug => "self_debug",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cot" | "chain_of_thought" => Ok(Strategy::ChainOfThought),
            "self_edit" => Ok(Strategy::SelfEdit),
            "self_debug" => Ok(Strategy::SelfDebug),
            other => Err(format!(
                "unknown strategy '{}', expected 'cot', 'self_edit' or 'self_debug'",
                other
            )),
        }
    }
}

/// Runs strategies for single problems. Holds no per-attempt state, so one
/// solver serves every attempt of a run.
#[derive(Debug, Clone)]
pub struct Solver {
    pub(crate) generator: Arc<StructuredGenerator>,
    pub(crate) executor: CandidateExecutor,
}

impl Solver {
    pub fn new(generator: Arc<StructuredGenerator>, executor: CandidateExecutor) -> Self {
        Self {
            generator,
            executor,
        }
    }

    pub fn generator(&self) -> &StructuredGenerator {
        &self.generator
    }

    pub fn executor(&self) -> &CandidateExecutor {
        &self.executor
    }

    /// Runs one fresh attempt of `strategy` on `problem`.
    pub async fn solve(
        &self,
        strategy: Strategy,
        problem: &ProblemSpec,
        max_rounds: u32,
    ) -> SessionReport {
        match strategy {
            Strategy::ChainOfThought => self.solve_with_chain_of_thought(problem).await,
            Strategy::SelfEdit => self.solve_with_self_edit(problem).await,
            Strategy::SelfDebug => self.solve_with_self_debug(problem, max_rounds).await,
        }
    }

    /// One structured generation; the candidate is not executed.
    #[instrument(skip(self, problem), fields(task_id = %problem.task_id))]
    pub async fn solve_with_chain_of_thought(&self, problem: &ProblemSpec) -> SessionReport {
        let mut report = SessionReport::new(Strategy::ChainOfThought);
        report.generator_calls = 1;
        match self
            .generator
            .generate_structured(&build_cot_prompt(&problem.prompt))
            .await
        {
            Ok(candidate) => report.finish(Termination::Unverified, Some(candidate)),
            Err(e) => {
                debug!(error = %e, "No candidate produced");
                report.finish(Termination::GeneratorBreakdown, None)
            }
        }
    }

    /// Generate, then ask for a self-review. The reviewed candidate wins
    /// when it parses; otherwise the first one is kept.
    #[instrument(skip(self, problem), fields(task_id = %problem.task_id))]
    pub async fn solve_with_self_edit(&self, problem: &ProblemSpec) -> SessionReport {
        let mut report = SessionReport::new(Strategy::SelfEdit);

        report.generator_calls += 1;
        let first = match self
            .generator
            .generate_structured(&build_cot_prompt(&problem.prompt))
            .await
        {
            Ok(first) => first,
            Err(e) => {
                debug!(error = %e, "No first candidate produced");
                return report.finish(Termination::GeneratorBreakdown, None);
            }
        };

        report.generator_calls += 1;
        let reflection = build_reflection_prompt(&problem.prompt, &first.to_json());
        let chosen = match self.generator.generate_structured(&reflection).await {
            Ok(second) => second,
            Err(e) => {
                debug!(error = %e, "Review produced nothing, keeping first candidate");
                first
            }
        };
        report.finish(Termination::Unverified, Some(chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("cot".parse::<Strategy>(), Ok(Strategy::ChainOfThought));
        assert_eq!("self-edit".parse::<Strategy>(), Ok(Strategy::SelfEdit));
        assert_eq!("SELF_DEBUG".parse::<Strategy>(), Ok(Strategy::SelfDebug));
        assert!("beam".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_serde() {
        let s: Strategy = serde_yaml::from_str("cot").unwrap();
        assert_eq!(s, Strategy::ChainOfThought);
        let s: Strategy = serde_yaml::from_str("self_debug").unwrap();
        assert_eq!(s, Strategy::SelfDebug);
        assert_eq!(Strategy::SelfEdit.to_string(), "self_edit");
    }
}
