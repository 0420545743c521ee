// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The message log data model.
//!
//! `extra` is a tagged-variant enum (`kind` discriminator on the wire)
//! rather than a loose untyped map, per spec §9 DESIGN NOTES — each message
//! role carries exactly the metadata its kind produces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Exit,
}

/// One shell command extracted from an assistant turn.
///
/// `tool_call_id` is only populated in the tool-call dialect; it is required
/// there to correlate the observation back to its originating call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Metadata carried by a message, tagged by `kind` in the serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MessageExtra {
    /// Parsed action list, raw model response, cost, and timestamp for an
    /// assistant turn.
    #[serde(rename = "assistant")]
    Assistant {
        actions: Vec<Action>,
        raw_response: String,
        cost: f64,
        timestamp: String,
    },
    /// Raw command output and return code for a user-role observation
    /// (text dialect).
    #[serde(rename = "user_observation")]
    UserObservation {
        output: String,
        returncode: i32,
        timestamp: String,
    },
    /// Raw command output and return code for a tool-role observation
    /// (tool-call dialect), carrying the originating call id.
    #[serde(rename = "tool_observation")]
    ToolObservation {
        tool_call_id: String,
        output: String,
        returncode: i32,
        timestamp: String,
    },
    /// A recoverable parse failure re-injected to the LM as the next turn.
    #[serde(rename = "format_error")]
    FormatError { message: String, timestamp: String },
    /// A command timeout observation; partial output is preserved.
    #[serde(rename = "timeout_observation")]
    TimeoutObservation {
        output: String,
        timestamp: String,
    },
    /// A human-typed interruption injected during the interactive variant.
    #[serde(rename = "user_interruption")]
    UserInterruption { message: String, timestamp: String },
    /// A human rejection of a proposed action during `confirm` mode,
    /// injected to the LM as the next user turn.
    #[serde(rename = "user_rejection")]
    UserRejection { message: String, timestamp: String },
    /// A new task string typed at the Submitted confirmation prompt,
    /// converting a submission into a continuation of the run.
    #[serde(rename = "user_new_task")]
    UserNewTask { task: String, timestamp: String },
    /// The terminal message: exit status and submission text.
    #[serde(rename = "exit")]
    Exit {
        exit_status: String,
        submission: Option<String>,
    },
    /// No extra metadata (system / instance prompts).
    #[serde(rename = "none")]
    None,
}

impl Default for MessageExtra {
    fn default() -> Self {
        MessageExtra::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub extra: MessageExtra,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), extra: MessageExtra::None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), extra: MessageExtra::None }
    }

    pub fn exit(exit_status: impl Into<String>, submission: Option<String>) -> Self {
        Self {
            role: Role::Exit,
            content: String::new(),
            extra: MessageExtra::Exit { exit_status: exit_status.into(), submission },
        }
    }

    /// Number of actions attached to this message, if it is an assistant
    /// turn with parsed actions.
    pub fn actions(&self) -> &[Action] {
        match &self.extra {
            MessageExtra::Assistant { actions, .. } => actions,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_and_user_constructors_set_role() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
    }

    #[test]
    fn exit_message_carries_submission() {
        let m = Message::exit("Submitted", Some("patch".to_string()));
        match m.extra {
            MessageExtra::Exit { exit_status, submission } => {
                assert_eq!(exit_status, "Submitted");
                assert_eq!(submission.as_deref(), Some("patch"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn extra_round_trips_through_json_with_kind_tag() {
        let m = Message {
            role: Role::Assistant,
            content: "```mswea_bash_command\necho hi\n```".into(),
            extra: MessageExtra::Assistant {
                actions: vec![Action { command: "echo hi".into(), tool_call_id: None }],
                raw_response: "raw".into(),
                cost: 0.01,
                timestamp: "t".into(),
            },
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["extra"]["kind"], "assistant");
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.actions().len(), 1);
    }

    #[test]
    fn actions_empty_for_non_assistant_message() {
        let m = Message::user("hi");
        assert!(m.actions().is_empty());
    }
}
