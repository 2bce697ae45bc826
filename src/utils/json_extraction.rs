//! Locating a JSON object inside raw model output.
//!
//! Small code models wrap their answer in prose, markdown fences or chat
//! template leftovers. These helpers produce the ordered list of text spans
//! worth handing to a schema parser; they never guess at content, and the
//! final fallback is always the whole (trimmed) output so the parser can fail
//! closed.
//!
//! # Example
//!
//! ```
//! use cot_bench::utils::json_extraction::candidate_spans;
//!
//! let raw = "Sure! {\"reasoning\": \"r\", \"code\": \"def f(): pass\"} Hope it helps.";
//! let spans = candidate_spans(raw);
//! assert_eq!(spans[0], "{\"reasoning\": \"r\", \"code\": \"def f(): pass\"}");
//! ```

use regex::Regex;

/// Ordered, de-duplicated spans of `content` that may hold the JSON object.
///
/// Order:
/// 1. Body of a ```json fenced block
/// 2. Outermost slice from the first `{` to the last `}`
/// 3. First brace-balanced object starting at the first `{`
/// 4. The whole trimmed content
pub fn candidate_spans(content: &str) -> Vec<&str> {
    let trimmed = content.trim();
    let mut spans: Vec<&str> = Vec::with_capacity(4);

    fn push<'a>(span: &'a str, spans: &mut Vec<&'a str>) {
        if !span.is_empty() && !spans.contains(&span) {
            spans.push(span);
        }
    }

    if let Some(block) = extract_from_json_code_block(trimmed) {
        push(block, &mut spans);
    }
    if let Some(outer) = outermost_object_span(trimmed) {
        push(outer, &mut spans);
    }
    if let Some(first) = first_balanced_object(trimmed) {
        push(first, &mut spans);
    }
    push(trimmed, &mut spans);

    spans
}

/// Slice from the first `{` to the last `}` (inclusive), if both exist in order.
pub fn outermost_object_span(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end > start {
        Some(content[start..=end].trim())
    } else {
        None
    }
}

/// The brace-balanced object beginning at the first `{`.
pub fn first_balanced_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = find_matching_brace(&content[start..])?;
    Some(&content[start..=start + end])
}

/// Find the index of the `}` closing the object that `s` starts with.
///
/// Handles nested braces, string literals and escape sequences inside
/// strings. Returns `None` when the object never closes.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                depth += 1;
            }
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Body of the first ```json fenced block whose content starts with `{`.
pub fn extract_from_json_code_block(content: &str) -> Option<&str> {
    let re = Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").ok()?;
    let body = re.captures(content)?.get(1)?.as_str().trim();
    if body.starts_with('{') {
        Some(body)
    } else {
        None
    }
}

/// Remove markdown code fences (```python, ```json, bare ```), keeping their bodies.
pub fn strip_code_fences(content: &str) -> String {
    match Regex::new(r"```[A-Za-z0-9_+-]*") {
        Ok(re) => re.replace_all(content, "").trim().to_string(),
        Err(_) => content.trim().to_string(),
    }
}
