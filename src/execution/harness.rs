//! The Python program that runs inside an execution facility.
//!
//! The harness reads one JSON [`HarnessPayload`] from stdin, defines the
//! candidate in a fresh namespace seeded with `from typing import *`, binds
//! it to the name `candidate`, and runs the verification routine. Its verdict
//! is printed on a single stdout line prefixed with a per-job nonce so that
//! whatever the candidate prints cannot forge it.

use serde::{Deserialize, Serialize};

/// Harness source, passed to the interpreter with `-c`.
pub const HARNESS_SOURCE: &str = r#"
import json, linecache, sys, traceback

def main():
    payload = json.loads(sys.stdin.read())
    nonce = payload["nonce"]
    frames = payload["frames"]

    def report(status, diagnostic="", index=None):
        verdict = {"status": status, "diagnostic": diagnostic, "index": index}
        sys.stdout.write("\n" + nonce + json.dumps(verdict) + "\n")
        sys.stdout.flush()

    def load(source, filename):
        linecache.cache[filename] = (len(source), None, source.splitlines(True), filename)
        return compile(source, filename, "exec")

    ns = {}
    name = payload["function"]
    try:
        exec("from typing import *\n", ns, ns)
        exec(load(payload["code"], "<candidate>"), ns, ns)
        if not callable(ns.get(name)):
            raise NameError("function '%s' is not defined" % name)
        ns["candidate"] = lambda *args, **kwargs: ns[name](*args, **kwargs)
    except BaseException:
        report("definition_error", traceback.format_exc(limit=frames))
        return

    try:
        exec(load(payload["test"], "<test>"), ns, ns)
    except BaseException:
        report("runtime_failure", traceback.format_exc(limit=frames))
        return

    if payload["mode"] == "triage":
        for i, line in enumerate(payload.get("asserts", [])):
            scope = dict(ns)
            try:
                exec(line, scope, scope)
            except AssertionError:
                report("isolated", traceback.format_exc(limit=frames), i)
                return
            except BaseException:
                continue
        report("not_isolated")
        return

    try:
        ns["check"](ns["candidate"])
    except AssertionError:
        report("assertion_failure", traceback.format_exc(limit=frames))
    except BaseException:
        report("runtime_failure", traceback.format_exc(limit=frames))
    else:
        report("success")

main()
"#;

/// What the harness is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarnessMode {
    /// Run `check(candidate)` once.
    Check,
    /// Run each assertion line on its own and report the first that fails.
    Triage,
}

/// Job description sent to the harness on stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessPayload {
    pub mode: HarnessMode,
    pub code: String,
    pub test: String,
    /// Name the candidate defines; bound to `candidate`.
    pub function: String,
    /// Traceback frame limit.
    pub frames: u32,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asserts: Vec<String>,
}

/// Verdict status reported by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Success,
    AssertionFailure,
    RuntimeFailure,
    DefinitionError,
    Isolated,
    NotIsolated,
}

/// The harness's final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessVerdict {
    pub status: VerdictStatus,
    #[serde(default)]
    pub diagnostic: String,
    /// Zero-based assertion index for [`VerdictStatus::Isolated`].
    #[serde(default)]
    pub index: Option<usize>,
}

/// Finds the last stdout line tagged with `nonce` and decodes its verdict.
pub fn parse_verdict(stdout: &str, nonce: &str) -> Option<HarnessVerdict> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(nonce))
        .and_then(|json| serde_json::from_str(json).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_ignores_candidate_output() {
        let nonce = "n-123:";
        let stdout = format!(
            "hello from candidate\n{{\"status\": \"success\"}}\n\n{}{{\"status\": \"assertion_failure\", \"diagnostic\": \"Traceback\", \"index\": null}}\n",
            nonce
        );
        let verdict = parse_verdict(&stdout, nonce).unwrap();
        assert_eq!(verdict.status, VerdictStatus::AssertionFailure);
        assert_eq!(verdict.diagnostic, "Traceback");
    }

    #[test]
    fn test_parse_verdict_missing() {
        assert!(parse_verdict("Killed\n", "n-1:").is_none());
        assert!(parse_verdict("n-1:{not json", "n-1:").is_none());
    }

    #[test]
    fn test_parse_isolated_verdict() {
        let verdict =
            parse_verdict("x:{\"status\": \"isolated\", \"diagnostic\": \"\", \"index\": 2}", "x:")
                .unwrap();
        assert_eq!(verdict.status, VerdictStatus::Isolated);
        assert_eq!(verdict.index, Some(2));
    }

    #[test]
    fn test_payload_serialization() {
        let payload = HarnessPayload {
            mode: HarnessMode::Check,
            code: "def f(): pass".to_string(),
            test: "def check(c): pass".to_string(),
            function: "f".to_string(),
            frames: 5,
            nonce: "abc:".to_string(),
            asserts: Vec::new(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["mode"], "check");
        assert_eq!(json["frames"], 5);
        assert!(json.get("asserts").is_none());
    }
}
