// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use taskloop_model::Message;

/// The outcome of a single `execute()` call.
/// Output is merged stdout+stderr, decoded as UTF-8 with replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub returncode: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_info: Option<String>,
}

impl ExecutionResult {
    pub fn to_value(&self) -> Value {
        json!({
            "output": self.output,
            "returncode": self.returncode,
            "exception_info": self.exception_info,
        })
    }
}

/// The result of handing one assistant turn's actions to
/// `Environment::execute_messages`.
#[derive(Debug)]
pub enum ExecOutcome {
    /// Observation messages for every action in the turn, in order.
    Observations(Vec<Message>),
    /// The submission sentinel was detected: the turn ends here, with the
    /// observations produced by any actions *before* the submitting one
    /// (per the original `_check_finished` semantics: the submitting
    /// action's own output becomes the submission, not a regular
    /// observation) plus the submission payload.
    Submitted { observations_before: Vec<Message>, submission: String },
}

/// Which non-blank line of the command output carries the submission
/// sentinel, per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelPosition {
    /// Local / sandbox backends: first non-blank line.
    FirstLine,
    /// Container backend: last non-blank line.
    LastLine,
}

pub const SUBMIT_MARKER: &str = "COMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT";

/// Check whether `result` indicates task completion, per spec §4.B: the
/// marker line must be present at the configured position AND the return
/// code must be 0. Returns the submission payload (the remaining output
/// with the marker line removed) if so.
pub fn check_submission(result: &ExecutionResult, position: SentinelPosition) -> Option<String> {
    if result.returncode != 0 {
        return None;
    }
    let trimmed = result.output.trim_start_matches(['\r', '\n', ' ', '\t']);
    if trimmed.is_empty() {
        return None;
    }
    let lines: Vec<&str> = trimmed.split_inclusive('\n').collect();
    match position {
        SentinelPosition::FirstLine => {
            let first = lines.first()?;
            if first.trim() == SUBMIT_MARKER {
                Some(lines[1..].concat())
            } else {
                None
            }
        }
        SentinelPosition::LastLine => {
            let output_rstripped = result.output.trim_end_matches(['\r', '\n', ' ', '\t']);
            if output_rstripped.is_empty() {
                return None;
            }
            let lines: Vec<&str> = output_rstripped.split_inclusive('\n').collect();
            let last = lines.last()?;
            if last.trim() == SUBMIT_MARKER {
                Some(lines[..lines.len() - 1].concat())
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(output: &str, returncode: i32) -> ExecutionResult {
        ExecutionResult { output: output.to_string(), returncode, exception_info: None }
    }

    #[test]
    fn first_line_marker_with_returncode_zero_submits() {
        let r = result("COMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT\nhello\n", 0);
        let sub = check_submission(&r, SentinelPosition::FirstLine).unwrap();
        assert_eq!(sub, "hello\n");
    }

    #[test]
    fn first_line_marker_with_nonzero_returncode_does_not_submit() {
        let r = result("COMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT\nhello\n", 1);
        assert!(check_submission(&r, SentinelPosition::FirstLine).is_none());
    }

    #[test]
    fn last_line_marker_submits_for_docker_policy() {
        let r = result("hello\nCOMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT\n", 0);
        let sub = check_submission(&r, SentinelPosition::LastLine).unwrap();
        assert_eq!(sub, "hello\n");
    }

    #[test]
    fn no_marker_does_not_submit() {
        let r = result("just some output\n", 0);
        assert!(check_submission(&r, SentinelPosition::FirstLine).is_none());
        assert!(check_submission(&r, SentinelPosition::LastLine).is_none());
    }

    #[test]
    fn empty_output_does_not_submit() {
        let r = result("", 0);
        assert!(check_submission(&r, SentinelPosition::FirstLine).is_none());
    }

    #[test]
    fn first_line_policy_ignores_marker_in_later_lines() {
        let r = result("hello\nCOMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT\n", 0);
        assert!(check_submission(&r, SentinelPosition::FirstLine).is_none());
    }
}
