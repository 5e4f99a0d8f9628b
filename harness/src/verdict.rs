//! Pure verdict classification for one snippet execution.

use serde::{Deserialize, Serialize};

use crate::catalog::Snippet;
use crate::executor::ExecutionResult;

/// Classification of one snippet's execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Unverified,
}

impl Verdict {
    /// Label used in text output.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Unverified => "unverified",
        }
    }
}

/// Classify an execution result against the snippet's expectation.
///
/// Any execution error is a `Fail`. With an expectation, output must match
/// it; without one, a clean run is `Unverified`. Interpreters emit a final
/// newline, so one trailing newline is ignored on both sides.
pub fn evaluate(snippet: &Snippet, result: &ExecutionResult) -> Verdict {
    if result.error.is_some() {
        return Verdict::Fail;
    }
    match &snippet.expected_output {
        Some(expected) => {
            if trim_final_newline(expected) == trim_final_newline(&result.actual_output) {
                Verdict::Pass
            } else {
                Verdict::Fail
            }
        }
        None => Verdict::Unverified,
    }
}

fn trim_final_newline(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}
