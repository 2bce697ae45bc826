//! The `{reasoning, code}` record every structured generation must produce.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Keyword every accepted `code` value must start with.
pub const FUNCTION_KEYWORD: &str = "def ";

/// Why a text span was not accepted as a [`StructuredCandidate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("invalid JSON for schema: {0}")]
    InvalidJson(String),

    #[error("code does not start with 'def '")]
    MissingDefinition,
}

/// A model-proposed solution: advisory reasoning plus a function definition.
///
/// Instances are immutable once produced; a repair yields a new candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredCandidate {
    pub reasoning: String,
    pub code: String,
}

impl StructuredCandidate {
    /// Builds a candidate, enforcing the `def ` invariant.
    pub fn new(
        reasoning: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<Self, SchemaViolation> {
        let candidate = Self {
            reasoning: reasoning.into(),
            code: code.into(),
        };
        candidate.check()?;
        Ok(candidate)
    }

    /// Parses and validates one JSON text. Unknown fields are ignored.
    pub fn parse(text: &str) -> Result<Self, SchemaViolation> {
        let candidate: Self = serde_json::from_str(text)
            .map_err(|e| SchemaViolation::InvalidJson(e.to_string()))?;
        candidate.check()?;
        Ok(candidate)
    }

    fn check(&self) -> Result<(), SchemaViolation> {
        if self.code.trim().starts_with(FUNCTION_KEYWORD) {
            Ok(())
        } else {
            Err(SchemaViolation::MissingDefinition)
        }
    }

    /// Compact JSON rendering embedded in reflection and repair prompts.
    pub fn to_json(&self) -> String {
        json!({ "reasoning": self.reasoning, "code": self.code }).to_string()
    }

    /// The completion text persisted for scoring: trimmed code plus a newline.
    pub fn completion(&self) -> String {
        format!("{}\n", self.code.trim())
    }

    /// JSON schema of the record, in the shape servers accept for constrained decoding.
    pub fn json_schema() -> serde_json::Value {
        json!({
            "title": "CotOutput",
            "type": "object",
            "properties": {
                "reasoning": { "title": "Reasoning", "type": "string" },
                "code": { "title": "Code", "type": "string" }
            },
            "required": ["reasoning", "code"]
        })
    }

    /// `response_format` payload requesting schema-constrained output.
    pub fn response_format() -> serde_json::Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": "cot_output",
                "schema": Self::json_schema()
            }
        })
    }
}
