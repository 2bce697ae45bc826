//! Prompts for structured code generation, self-review and repair.
//!
//! Every template asks for exactly one `{"reasoning", "code"}` JSON object.
//! The repeated warnings about quoting are there because small models tend
//! to emit docstrings and double quotes that break JSON string escaping.

/// Chain-of-thought generation from the problem prompt.
const COT_TEMPLATE: &str = r#"You are an expert Python programmer.

Goal: Return ONLY a single JSON object that validates against:

{
  "reasoning": "1-4 concise sentences",
  "code": "a complete Python function starting with 'def ' on the first line"
}

Hard rules (critical):
- Output must be a single JSON object. No markdown, no backticks, no prefixes/suffixes.
- The JSON string values must be valid JSON. Escape backslashes and quotes as needed.
- NEVER use Python triple-quoted strings (no `"""` or `'''`) or comments in the code.
- The code must start with `def ` on the first line.
- Use **only single quotes `'`** for all string literals and docstrings inside code.
- Do **not** use triple quotes or double quotes anywhere.

Problem:
{problem}"#;

/// Self-review of a previous candidate.
const REFLECTION_TEMPLATE: &str = r#"You are an expert Python code reviewer and editor.

You previously wrote this JSON (reasoning + code):
{previous}

Review it for logical, syntax, or efficiency errors.
Return a corrected JSON object using the same schema:
{
  "reasoning": "1-4 concise sentences",
  "code": "a complete Python function starting with 'def ' on the first line"
}

Rules:
- Output only one JSON object, no markdown or prose.
- Escape backslashes and quotes correctly.
- No triple-quoted strings or comments.
- No imports or type hints requiring typing.List etc.
- If the original code is already correct, return the same JSON.
- The code must start with 'def ' on the first line.
- In the code string, always use single quotes ' for all string literals.
- Do not use double quotes (") anywhere in code, because it breaks JSON

Problem:
{problem}"#;

/// Repair of a candidate that failed its verification routine.
const DEBUG_TEMPLATE: &str = r#"You are a Python debugging assistant.

Problem:
{problem}

Your previous solution (as JSON) failed during testing:
{previous}

Error message:
{error}

Analyze the cause and return a corrected JSON object:
{
  "reasoning": "1-3 concise sentences explaining the bug and fix",
  "code": "a complete Python function starting with 'def '"
}

Rules:
- Keep the same function signature.
- Do not add imports.
- Use only single quotes for all string literals.
- Output ONE JSON object, no markdown, no prose.
- Escape backslashes and quotes correctly."#;

/// Builds the chain-of-thought prompt for a problem.
pub fn build_cot_prompt(problem: &str) -> String {
    COT_TEMPLATE.replace("{problem}", problem.trim())
}

/// Builds the self-review prompt around the previous candidate's JSON.
pub fn build_reflection_prompt(problem: &str, previous_json: &str) -> String {
    REFLECTION_TEMPLATE
        .replace("{previous}", previous_json.trim())
        .replace("{problem}", problem.trim())
}

/// Builds the repair prompt: the previous candidate and its failure only.
pub fn build_debug_prompt(problem: &str, previous_json: &str, error: &str) -> String {
    // `{problem}` last: problem text may itself contain the other placeholders.
    DEBUG_TEMPLATE
        .replace("{previous}", previous_json.trim())
        .replace("{error}", error.trim())
        .replace("{problem}", problem.trim())
}
