//! Prompts for coverage-driven test augmentation and formal specifications.

/// New pytest tests that raise branch coverage of a function.
const COVERAGE_TEMPLATE: &str = r#"You are an expert Python software tester specializing in coverage-driven test generation.

Goal:
Generate **only new** Pytest-style unit tests for the following Python function.
These tests must specifically increase **branch coverage** by triggering:
- all remaining untested conditions, else-paths, or early exits,
- both True and False outcomes of conditionals,
- edge inputs (empty, None, minimal, maximal, etc.).

Constraints:
- The function code is provided below.
- Do not modify or rewrite the function.
- Do not repeat existing tests; only add new ones.
- Each test must have a **unique, descriptive name** like:
  `test_condition_true_branch`, `test_empty_input_exit_path`, etc.
- Each test must be fully runnable with `pytest` and assert actual outcomes.
- Avoid any print statements or comments.
- Your output must contain **only the test function definitions**, nothing else.
- Do **not** include explanations, summaries, or markdown fences.

Function under test:
{function}

Existing tests:
{tests}

- PROVIDE ONLY THE TEST CASES NO OTHER TEXTS"#;

/// New pytest tests derived only from a block of specification assertions.
const SPEC_TESTS_TEMPLATE: &str = r#"You are an expert Python software tester specializing in coverage-driven test generation.

Your job is to generate **new Pytest unit tests** for a target function, based entirely on the function's **formal specification**, which is provided as a set of `assert` statements.

You MUST use the assertions as the sole source of truth for:
- valid vs invalid inputs,
- expected outputs,
- failure conditions,
- boundary behaviors.

### YOUR TASK
Create **only new Pytest-style test functions**, each of which:
- Covers a previously untested branch, edge case, or assertion outcome.
- Exercises both valid inputs that must satisfy all assertions and invalid inputs that must raise `AssertionError`.
- Reflects the exact behavior defined by the assertion block.
- Does NOT depend on any internal implementation (the assertions are the oracle).
- Has a unique descriptive test name.

### STRICT OUTPUT RULES
- Output **only** the new test function definitions.
- No text, no comments, no markdown fences, no explanation.
- No print statements.
- Use only `assert` and `with pytest.raises(AssertionError):`.
- Do not rewrite or include the assertions or function signature in the output.
- Do not duplicate existing tests.

### DATA PROVIDED TO YOU
Assertions:
{assertions}

Existing Tests:
{tests}

Provide ONLY the new Pytest test function definitions and NOTHING ELSE."#;

/// Assert-only formal specification of a function.
const SPEC_ASSERTIONS_TEMPLATE: &str = r#"Your task is to write ONLY *formal specifications* in the form of Python `assert`
statements for the following function.

This is NOT code generation.
This is NOT test-case generation.
This is NOT implementation.

You MUST write logical constraints ONLY.

### STRICT, NON-NEGOTIABLE RULES
1. Refer to the function inputs ONLY by their parameter names.
2. Refer to the function output ONLY as `result`.
3. Write both preconditions on the inputs and postconditions on `result`.
4. Hard Forbidden:
   - DO NOT call the function.
   - DO NOT write the function implementation.
   - DO NOT write test cases.
   - DO NOT invent constraints not in the description.
   - DO NOT create new variables (no helper variables, no loops, no lambdas).
   - DO NOT mutate data or perform I/O (print, read, write).
   - DO NOT use randomness or timing.
5. The output MUST be ONLY assert statements, each describing a logical requirement.

### Function Signature:
{signature}

### Natural Language Description:
{description}

### OUTPUT FORMAT (CRITICAL)
- Output ONLY raw Python assert statements.
- No text, no comments, no explanation.
- No code fences.

BEGIN OUTPUT NOW:"#;

/// Builds the coverage-driven test prompt.
pub fn build_coverage_prompt(function_source: &str, existing_tests: &str) -> String {
    COVERAGE_TEMPLATE
        .replace("{tests}", existing_tests.trim())
        .replace("{function}", function_source.trim())
}

/// Builds the specification-driven test prompt.
pub fn build_spec_tests_prompt(assertions: &str, existing_tests: &str) -> String {
    SPEC_TESTS_TEMPLATE
        .replace("{tests}", existing_tests.trim())
        .replace("{assertions}", assertions.trim())
}

/// Builds the formal-specification prompt.
pub fn build_spec_assertions_prompt(signature: &str, description: &str) -> String {
    SPEC_ASSERTIONS_TEMPLATE
        .replace("{description}", description.trim())
        .replace("{signature}", signature.trim())
}
