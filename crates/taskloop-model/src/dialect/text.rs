// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Regex-tagged text dialect.
//!
//! Grounded on `original_source/models/utils/actions_text.py::parse_regex_actions`
//! and `format_observation_messages`: exactly one fenced
//! ` ```mswea_bash_command ` block per assistant turn, ported verbatim over
//! `regex` + `taskloop-template` instead of `re.findall` + jinja2.

use regex::Regex;
use serde_json::json;

use crate::error::FormatError;
use crate::message::{Action, Message, MessageExtra, Role};

/// Parse actions from `content` using `action_regex`. If `use_legacy_fence`
/// is set, `legacy_regex` is tried as well and its matches are appended
///.
///
/// Raises [`FormatError`] unless exactly one action is found.
pub fn parse_regex_actions(
    content: &str,
    action_regex: &str,
    legacy_regex: Option<&str>,
    format_error_template: &str,
) -> Result<Vec<Action>, FormatError> {
    let re = Regex::new(action_regex).map_err(|e| FormatError(format!("invalid action_regex: {e}")))?;
    let mut actions: Vec<String> = re
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .collect();

    if let Some(legacy) = legacy_regex {
        let legacy_re =
            Regex::new(legacy).map_err(|e| FormatError(format!("invalid legacy_action_regex: {e}")))?;
        actions.extend(
            legacy_re
                .captures_iter(content)
                .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string())),
        );
    }

    if actions.len() != 1 {
        let vars = json!({ "actions": actions });
        let rendered = taskloop_template::render(format_error_template, &vars)
            .unwrap_or_else(|e| format!("format error (template also failed: {e})"));
        return Err(FormatError(rendered));
    }

    Ok(vec![Action { command: actions.remove(0), tool_call_id: None }])
}

/// Render one observation message per `(action, output)` pair using
/// `observation_template`. Text dialect uses role `user` for observations.
pub fn format_observation_messages(
    outputs: &[serde_json::Value],
    observation_template: &str,
    template_vars: &serde_json::Value,
) -> Result<Vec<Message>, FormatError> {
    outputs
        .iter()
        .map(|output| {
            let mut vars = template_vars.clone();
            if let Some(map) = vars.as_object_mut() {
                map.insert("output".to_string(), output.clone());
            }
            let content = taskloop_template::render(observation_template, &vars)
                .map_err(|e| FormatError(e.to_string()))?;
            Ok(Message {
                role: Role::User,
                content,
                extra: MessageExtra::UserObservation {
                    output: output.get("output").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    returncode: output.get("returncode").and_then(|v| v.as_i64()).unwrap_or(-1) as i32,
                    timestamp: crate::now_timestamp(),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FENCE: &str = r"(?s)```mswea_bash_command\s*\n(.*?)\n```";
    const LEGACY: &str = r"(?s)```bash\s*\n(.*?)\n```";
    const ERR_TMPL: &str = "found {{ actions|length }} actions";

    #[test]
    fn exactly_one_action_parses() {
        let content = "```mswea_bash_command\necho hi\n```";
        let actions = parse_regex_actions(content, FENCE, None, ERR_TMPL).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].command, "echo hi");
    }

    #[test]
    fn zero_actions_is_format_error() {
        let err = parse_regex_actions("no backticks here", FENCE, None, ERR_TMPL).unwrap_err();
        assert!(err.0.contains("found 0 actions"));
    }

    #[test]
    fn two_actions_is_format_error() {
        let content = "```mswea_bash_command\necho a\n```\n```mswea_bash_command\necho b\n```";
        let err = parse_regex_actions(content, FENCE, None, ERR_TMPL).unwrap_err();
        assert!(err.0.contains("found 2 actions"));
    }

    #[test]
    fn legacy_fence_rejected_unless_enabled() {
        let content = "```bash\necho hi\n```";
        let err = parse_regex_actions(content, FENCE, None, ERR_TMPL).unwrap_err();
        assert!(err.0.contains("found 0 actions"));
        let actions = parse_regex_actions(content, FENCE, Some(LEGACY), ERR_TMPL).unwrap();
        assert_eq!(actions[0].command, "echo hi");
    }

    #[test]
    fn observation_messages_carry_returncode_and_output() {
        let outputs = vec![json!({"output": "hi\n", "returncode": 0})];
        let msgs = format_observation_messages(
            &outputs,
            "<returncode>{{ output.returncode }}</returncode>",
            &json!({}),
        )
        .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].content, "<returncode>0</returncode>");
    }
}
