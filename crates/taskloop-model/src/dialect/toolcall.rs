// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Native tool-call dialect.
//!
//! Grounded on `original_source/models/utils/actions_toolcall_response.py`:
//! a single `bash(command: string)` tool is registered with the provider;
//! every tool-call in the turn must name it, and a missing `command`
//! argument is a format error. Observation messages use role `tool` and
//! carry the originating `tool_call_id`.

use serde_json::{json, Value};

use crate::error::FormatError;
use crate::message::{Action, Message, MessageExtra, Role};

/// The `bash` tool schema declared to tool-call providers.
pub fn bash_tool_schema() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": "bash",
            "description": "Execute a bash command",
            "parameters": {
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The shell command to execute" }
                },
                "required": ["command"],
                "additionalProperties": false
            }
        }
    })
}

/// One raw tool-call as returned by the provider's native tool-calling API.
#[derive(Debug, Clone)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments string.
    pub arguments: String,
}

/// Parse tool calls into [`Action`]s. Requires at least one call and that
/// every call names `bash` with a `command` string argument.
pub fn parse_toolcall_actions(
    tool_calls: &[RawToolCall],
    format_error_template: &str,
) -> Result<Vec<Action>, FormatError> {
    if tool_calls.is_empty() {
        let rendered = render_error(format_error_template, "No tool calls found in the response.");
        return Err(FormatError(rendered));
    }

    let mut actions = Vec::with_capacity(tool_calls.len());
    for call in tool_calls {
        if call.name != "bash" {
            let rendered =
                render_error(format_error_template, &format!("Unknown tool '{}'.", call.name));
            return Err(FormatError(rendered));
        }
        let args: Value = serde_json::from_str(&call.arguments).map_err(|e| {
            FormatError(render_error(
                format_error_template,
                &format!("Error parsing tool call arguments: {e}."),
            ))
        })?;
        let command = match args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => {
                let rendered = render_error(
                    format_error_template,
                    "Missing 'command' argument in bash tool call.",
                );
                return Err(FormatError(rendered));
            }
        };
        actions.push(Action { command, tool_call_id: Some(call.id.clone()) });
    }
    Ok(actions)
}

fn render_error(template: &str, error: &str) -> String {
    taskloop_template::render(template, &json!({ "error": error }))
        .unwrap_or_else(|_| error.to_string())
}

/// Render one observation message per `(action, output)` pair. Tool-call
/// dialect uses role `tool` and carries `tool_call_id`.
pub fn format_observation_messages(
    actions: &[Action],
    outputs: &[Value],
    observation_template: &str,
    template_vars: &Value,
) -> Result<Vec<Message>, FormatError> {
    actions
        .iter()
        .zip(outputs.iter())
        .map(|(action, output)| {
            let mut vars = template_vars.clone();
            if let Some(map) = vars.as_object_mut() {
                map.insert("output".to_string(), output.clone());
            }
            let content = taskloop_template::render(observation_template, &vars)
                .map_err(|e| FormatError(e.to_string()))?;
            let tool_call_id = action.tool_call_id.clone().unwrap_or_default();
            Ok(Message {
                role: Role::Tool,
                content,
                extra: MessageExtra::ToolObservation {
                    tool_call_id,
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

    const ERR_TMPL: &str = "{{ error }}";

    fn call(id: &str, name: &str, args: &str) -> RawToolCall {
        RawToolCall { id: id.into(), name: name.into(), arguments: args.into() }
    }

    #[test]
    fn empty_tool_calls_is_format_error() {
        let err = parse_toolcall_actions(&[], ERR_TMPL).unwrap_err();
        assert!(err.0.contains("No tool calls"));
    }

    #[test]
    fn unknown_tool_name_is_format_error() {
        let calls = vec![call("1", "ls", "{}")];
        let err = parse_toolcall_actions(&calls, ERR_TMPL).unwrap_err();
        assert!(err.0.contains("Unknown tool 'ls'"));
    }

    #[test]
    fn missing_command_argument_is_format_error() {
        let calls = vec![call("1", "bash", "{}")];
        let err = parse_toolcall_actions(&calls, ERR_TMPL).unwrap_err();
        assert!(err.0.contains("Missing 'command'"));
    }

    #[test]
    fn valid_call_parses_with_tool_call_id() {
        let calls = vec![call("abc", "bash", r#"{"command": "echo hi"}"#)];
        let actions = parse_toolcall_actions(&calls, ERR_TMPL).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].command, "echo hi");
        assert_eq!(actions[0].tool_call_id.as_deref(), Some("abc"));
    }

    #[test]
    fn multiple_valid_calls_all_parse() {
        let calls = vec![
            call("1", "bash", r#"{"command": "echo a"}"#),
            call("2", "bash", r#"{"command": "echo b"}"#),
        ];
        let actions = parse_toolcall_actions(&calls, ERR_TMPL).unwrap();
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn observation_messages_use_tool_role_and_carry_id() {
        let actions = vec![Action { command: "echo hi".into(), tool_call_id: Some("call-1".into()) }];
        let outputs = vec![json!({"output": "hi\n", "returncode": 0})];
        let msgs = format_observation_messages(
            &actions,
            &outputs,
            "<returncode>{{ output.returncode }}</returncode>",
            &json!({}),
        )
        .unwrap();
        assert_eq!(msgs[0].role, Role::Tool);
        match &msgs[0].extra {
            MessageExtra::ToolObservation { tool_call_id, .. } => assert_eq!(tool_call_id, "call-1"),
            _ => panic!("wrong variant"),
        }
    }
}
