//! Turning raw model output into a runnable pytest file.

use std::collections::HashSet;

use regex::Regex;

use crate::utils::json_extraction::strip_code_fences;
use crate::utils::text::normalize_whitespace;

/// Name of the first `def NAME(` in `source`.
pub fn first_function_name(source: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^\s*def\s+(\w+)\s*\(").ok()?;
    re.captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Splits a HumanEval prompt into the entry point's signature line and the
/// rest of the text (docstring and examples), quotes removed.
pub fn split_prompt<'a>(prompt: &'a str, entry_point: &str) -> (&'a str, String) {
    let needle = format!("def {}", entry_point);
    let lines: Vec<&str> = prompt.lines().collect();
    let position = lines
        .iter()
        .position(|line| line.trim_start().starts_with(&needle))
        .or_else(|| lines.iter().position(|line| line.trim_start().starts_with("def ")));

    match position {
        Some(i) => {
            let description = lines[i + 1..]
                .join("\n")
                .replace("\"\"\"", "")
                .replace("'''", "");
            (lines[i].trim(), description.trim().to_string())
        }
        None => ("", prompt.trim().to_string()),
    }
}

/// `def test_` blocks of `text`; lines before the first block are dropped.
fn test_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with("def test_") {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
            current.push(line.trim_end());
        } else if !current.is_empty() {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// Keeps complete, asserting, unique test blocks.
///
/// A block is kept when it contains `assert` and its trimmed text ends in
/// `)` or `]` (generation cut off mid-statement otherwise). Duplicates are
/// detected on whitespace-normalised text; the first occurrence wins.
pub fn usable_tests(raw: &str) -> Vec<String> {
    let cleaned = strip_code_fences(raw);
    let mut seen = HashSet::new();
    test_blocks(&cleaned)
        .into_iter()
        .filter(|block| block.contains("assert"))
        .filter(|block| {
            let trimmed = block.trim_end();
            trimmed.ends_with(')') || trimmed.ends_with(']')
        })
        .filter(|block| seen.insert(normalize_whitespace(block)))
        .collect()
}

/// Import header binding `function` from the candidate module `module`.
pub fn import_block(module: &str, function: &str) -> String {
    format!(
        "import importlib, pytest\n\nmod = importlib.import_module(\"{module}\")\n{function} = getattr(mod, \"{function}\")\n\n\n"
    )
}

/// The final pytest file text for `tests`.
pub fn render_test_file(tests: &[String], module: &str, function: &str) -> String {
    format!("{}{}\n", import_block(module, function), tests.join("\n\n"))
}

/// Keeps only the `assert` lines of a generated formal specification.
pub fn clean_spec_assertions(raw: &str) -> String {
    strip_code_fences(raw)
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("assert"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_function_name() {
        let prompt = "from typing import List\n\n\ndef has_close_elements(numbers: List[float]) -> bool:\n";
        assert_eq!(first_function_name(prompt).as_deref(), Some("has_close_elements"));
        assert_eq!(first_function_name("x = 1"), None);
    }

    #[test]
    fn test_split_prompt_prefers_entry_point() {
        let prompt = "def is_palindrome(s: str) -> bool:\n    return s == s[::-1]\n\n\ndef make_palindrome(string: str) -> str:\n    \"\"\" Find the shortest palindrome.\n    >>> make_palindrome('')\n    ''\n    \"\"\"\n";
        let (signature, description) = split_prompt(prompt, "make_palindrome");
        assert_eq!(signature, "def make_palindrome(string: str) -> str:");
        assert!(description.starts_with("Find the shortest palindrome."));
        assert!(!description.contains("\"\"\""));
    }

    #[test]
    fn test_usable_tests_filters_and_dedupes() {
        let raw = "```python\nHere are tests:\ndef test_a():\n    assert f(1) == (1, 2)\n\ndef test_b():\n    x = f(2)\n\ndef test_a_again():\n    assert f(1) == (1, 2)\ndef test_cut():\n    assert f(3) == [1,\n```";
        let tests = usable_tests(raw);
        assert_eq!(tests.len(), 2);
        assert!(tests[0].starts_with("def test_a():"));
        assert!(tests[1].starts_with("def test_a_again():"));
    }

    #[test]
    fn test_usable_tests_dedupes_on_normalised_whitespace() {
        let raw = "def test_x():\n    assert f([1]) == [1]\ndef test_x():\n        assert   f([1]) == [1]\n";
        assert_eq!(usable_tests(raw).len(), 1);
    }

    #[test]
    fn test_render_test_file() {
        let text = render_test_file(
            &["def test_a():\n    assert f(1) == g(1)".to_string()],
            "20__c1",
            "find_closest_elements",
        );
        assert!(text.starts_with("import importlib, pytest\n"));
        assert!(text.contains("mod = importlib.import_module(\"20__c1\")\n"));
        assert!(text.contains(
            "find_closest_elements = getattr(mod, \"find_closest_elements\")"
        ));
        assert!(text.ends_with("assert f(1) == g(1)\n"));
    }

    #[test]
    fn test_clean_spec_assertions() {
        let raw = "Sure! Here is the spec:\n```python\nassert isinstance(numbers, list)\n  assert len(numbers) >= 2\n# note\n```";
        assert_eq!(
            clean_spec_assertions(raw),
            "assert isinstance(numbers, list)\nassert len(numbers) >= 2"
        );
    }
}
