//! Model-driven test augmentation for split candidate modules.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::finalize::{
    clean_spec_assertions, first_function_name, render_test_file, split_prompt, usable_tests,
};
use crate::benchmark::ProblemSpec;
use crate::error::AugmentError;
use crate::export::ManifestEntry;
use crate::prompts::{build_coverage_prompt, build_spec_assertions_prompt, build_spec_tests_prompt};
use crate::structured::StructuredGenerator;
use crate::utils::text::truncate;

/// Token budget for one batch of generated tests.
pub const AUGMENT_MAX_TOKENS: u32 = 300;

/// Token budget for a generated formal specification.
pub const SPEC_MAX_TOKENS: u32 = 400;

/// Where the model gets its picture of the function from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AugmentMode {
    /// Candidate source plus the existing tests.
    #[default]
    Coverage,
    /// A generated block of `assert` statements plus the existing tests.
    Spec,
}

impl FromStr for AugmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coverage" => Ok(AugmentMode::Coverage),
            "spec" => Ok(AugmentMode::Spec),
            other => Err(format!(
                "unknown augment mode '{}', expected 'coverage' or 'spec'",
                other
            )),
        }
    }
}

/// One written test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AugmentedTests {
    pub task_id: String,
    pub index: usize,
    pub path: PathBuf,
    pub tests: usize,
}

/// Asks the model for new pytest tests targeting candidate modules.
#[derive(Debug, Clone)]
pub struct TestAugmenter {
    generator: Arc<StructuredGenerator>,
    max_tokens: u32,
}

impl TestAugmenter {
    pub fn new(generator: Arc<StructuredGenerator>) -> Self {
        Self {
            generator,
            max_tokens: AUGMENT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Generates an assert-only formal specification of the problem.
    pub async fn generate_spec_assertions(
        &self,
        problem: &ProblemSpec,
    ) -> Result<String, AugmentError> {
        let (signature, description) = split_prompt(&problem.prompt, &problem.entry_point);
        let prompt = build_spec_assertions_prompt(signature, &description);
        let raw = self.generator.generate_text(&prompt, SPEC_MAX_TOKENS).await?;
        let assertions = clean_spec_assertions(&raw);
        if assertions.is_empty() {
            return Err(AugmentError::NoTests(problem.task_id.clone()));
        }
        Ok(assertions)
    }

    /// Generates tests for one manifest entry and writes
    /// `<out_dir>/<module>_new_tests.py`.
    #[instrument(skip(self, entry, problem), fields(task_id = %entry.task_id, index = entry.index))]
    pub async fn augment_entry(
        &self,
        entry: &ManifestEntry,
        problem: &ProblemSpec,
        mode: AugmentMode,
        out_dir: &Path,
    ) -> Result<AugmentedTests, AugmentError> {
        let module = entry
            .module_name()
            .ok_or_else(|| AugmentError::NoFunction(entry.module.clone()))?;
        let source = std::fs::read_to_string(&entry.module)?;

        let function = if problem.entry_point.is_empty() {
            first_function_name(&problem.prompt)
                .or_else(|| first_function_name(&source))
                .ok_or_else(|| AugmentError::NoFunction(entry.module.clone()))?
        } else {
            problem.entry_point.clone()
        };

        let prompt = match mode {
            AugmentMode::Coverage => build_coverage_prompt(&source, &problem.test),
            AugmentMode::Spec => {
                let assertions = self.generate_spec_assertions(problem).await?;
                build_spec_tests_prompt(&assertions, &problem.test)
            }
        };

        let raw = self.generator.generate_text(&prompt, self.max_tokens).await?;
        debug!(raw = %truncate(&raw, 600), "Model test output");

        let tests = usable_tests(&raw);
        if tests.is_empty() {
            return Err(AugmentError::NoTests(entry.task_id.clone()));
        }

        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!("{}_new_tests.py", module));
        std::fs::write(&path, render_test_file(&tests, module, &function))?;
        info!(path = %path.display(), tests = tests.len(), "Wrote augmented tests");

        Ok(AugmentedTests {
            task_id: entry.task_id.clone(),
            index: entry.index,
            path,
            tests: tests.len(),
        })
    }
}
