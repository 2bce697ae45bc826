//! Deterministic text repairs tried before a parse attempt is declared failed.
//!
//! Small models like to put Python docstrings inside JSON string values,
//! which breaks the escaping. The passes below cut those spans out. The list
//! is versioned so recorded runs stay comparable when passes are added.

use regex::Regex;

/// One named text rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPass {
    pub name: &'static str,
    pattern: &'static str,
}

impl RepairPass {
    /// Applies the pass. Text without a match comes back unchanged.
    pub fn apply(&self, text: &str) -> String {
        match Regex::new(self.pattern) {
            Ok(re) => re.replace_all(text, "").into_owned(),
            Err(e) => {
                tracing::warn!(pass = self.name, error = %e, "Repair pass has an invalid pattern");
                text.to_string()
            }
        }
    }
}

/// Strip `"""…"""` spans, then `'''…'''` spans.
pub const REPAIR_PASSES_V1: &[RepairPass] = &[
    RepairPass {
        name: "strip_double_triple_quotes",
        pattern: r#""""[\s\S]*?""""#,
    },
    RepairPass {
        name: "strip_single_triple_quotes",
        pattern: r"'''[\s\S]*?'''",
    },
];

/// Runs `passes` cumulatively and returns every intermediate text that
/// differs from its predecessor, in order.
pub fn repaired_variants(text: &str, passes: &[RepairPass]) -> Vec<(&'static str, String)> {
    let mut variants = Vec::new();
    let mut current = text.to_string();
    for pass in passes {
        let next = pass.apply(&current);
        if next != current {
            variants.push((pass.name, next.clone()));
            current = next;
        }
    }
    variants
}
