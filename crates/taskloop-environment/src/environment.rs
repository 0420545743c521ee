// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The `Environment` facade: selects a back-end by `environment_class` and
//! drives one assistant turn's actions through it, producing either
//! observation messages or the terminal submission.
//!
//! Grounded on `original_source/agents/default.py::DefaultAgent.execute_actions`
//! + `environments/local.py`/`docker.py::execute_messages`: actions run in
//! order, the submission sentinel stops the turn immediately without
//! producing an observation for the submitting action itself, and a timeout
//! is a recoverable observation that also stops the turn — per spec §4.B/§8
//! no observation is produced for any action after the one that timed out
//! (the original's `continue` is overridden here).

use serde_json::{json, Value};

use taskloop_config::{EnvironmentClass, EnvironmentConfig};
use taskloop_model::dialect::{text, toolcall};
use taskloop_model::{Action, Message, MessageExtra, Role};

use crate::backend::{Backend, RawExecOutput};
use crate::docker::DockerBackend;
use crate::error::EnvError;
use crate::local::LocalBackend;
use crate::result::{check_submission, ExecOutcome, SentinelPosition};
use crate::sandbox::SandboxBackend;

fn docker_executable() -> String {
    std::env::var("TASKLOOP_DOCKER_EXECUTABLE").unwrap_or_else(|_| "docker".to_string())
}

pub struct Environment {
    config: EnvironmentConfig,
    backend: Box<dyn Backend>,
    environment_type: &'static str,
}

impl Environment {
    pub async fn from_config(config: EnvironmentConfig) -> Result<Self, EnvError> {
        let (backend, environment_type): (Box<dyn Backend>, &'static str) = match config.environment_class {
            EnvironmentClass::Local => {
                (Box::new(LocalBackend::new(config.clone())), "taskloop_environment.local.LocalBackend")
            }
            EnvironmentClass::Docker => (
                Box::new(DockerBackend::start(config.clone(), docker_executable()).await?),
                "taskloop_environment.docker.DockerBackend",
            ),
            EnvironmentClass::Sandbox => {
                (Box::new(SandboxBackend::new(config.clone())?), "taskloop_environment.sandbox.SandboxBackend")
            }
        };
        Ok(Self { config, backend, environment_type })
    }

    fn sentinel_position(&self) -> SentinelPosition {
        match self.config.environment_class {
            EnvironmentClass::Docker => SentinelPosition::LastLine,
            EnvironmentClass::Local | EnvironmentClass::Sandbox => SentinelPosition::FirstLine,
        }
    }

    /// Merge configured template vars with per-call overrides, the latter
    /// winning on conflict.
    pub fn template_vars(&self, extra: &Value) -> Value {
        let mut base = serde_json::to_value(&self.config).unwrap_or_else(|_| json!({}));
        if let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_map {
                base_map.insert(k.clone(), v.clone());
            }
        }
        base
    }

    /// Execute every action attached to `assistant`, in order. Returns the
    /// observation messages for the turn, or the submission if the sentinel
    /// was detected.
    pub async fn execute_messages(
        &self,
        assistant: &Message,
        extra_template_vars: &Value,
    ) -> Result<ExecOutcome, EnvError> {
        let actions = assistant.actions();
        let is_toolcall = actions.iter().any(|a| a.tool_call_id.is_some());

        let mut observations = Vec::new();
        let mut submission = None;

        for action in actions {
            let raw = self.backend.execute(&action.command, None, None).await?;
            match raw {
                RawExecOutput::TimedOut { partial_output } => {
                    observations.push(self.build_timeout_message(action, &partial_output, extra_template_vars)?);
                    break;
                }
                RawExecOutput::Completed(result) => {
                    if let Some(sub) = check_submission(&result, self.sentinel_position()) {
                        submission = Some(sub);
                        break;
                    }
                    observations.push(self.build_observation_message(
                        action,
                        &result.to_value(),
                        extra_template_vars,
                        is_toolcall,
                    )?);
                }
            }
        }

        match submission {
            Some(submission) => Ok(ExecOutcome::Submitted { observations_before: observations, submission }),
            None => Ok(ExecOutcome::Observations(observations)),
        }
    }

    fn build_observation_message(
        &self,
        action: &Action,
        output: &Value,
        extra_template_vars: &Value,
        is_toolcall: bool,
    ) -> Result<Message, EnvError> {
        let vars = self.template_vars(extra_template_vars);
        let outputs = [output.clone()];
        let mut messages = if is_toolcall {
            toolcall::format_observation_messages(
                std::slice::from_ref(action),
                &outputs,
                &self.config.action_observation_template,
                &vars,
            )
        } else {
            text::format_observation_messages(&outputs, &self.config.action_observation_template, &vars)
        }
        .map_err(|e| EnvError::Template(e.to_string()))?;
        Ok(messages.remove(0))
    }

    fn build_timeout_message(
        &self,
        action: &Action,
        partial_output: &str,
        extra_template_vars: &Value,
    ) -> Result<Message, EnvError> {
        let mut vars = self.template_vars(extra_template_vars);
        if let Some(map) = vars.as_object_mut() {
            map.insert("action".to_string(), json!(action.command));
            map.insert("output".to_string(), json!(partial_output));
        }
        let content = taskloop_template::render(&self.config.timeout_template, &vars)
            .map_err(|e| EnvError::Template(e.to_string()))?;
        Ok(Message {
            role: Role::User,
            content,
            extra: MessageExtra::TimeoutObservation {
                output: partial_output.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        })
    }

    pub fn serialize(&self) -> Value {
        json!({
            "info": {
                "config": {
                    "environment": self.config,
                    "environment_type": self.environment_type,
                }
            }
        })
    }

    pub async fn cleanup(&self) {
        self.backend.cleanup().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskloop_config::EnvironmentConfig;
    use taskloop_model::MessageExtra;

    fn assistant_with(commands: &[&str]) -> Message {
        let actions = commands.iter().map(|c| Action { command: c.to_string(), tool_call_id: None }).collect();
        Message {
            role: Role::Assistant,
            content: String::new(),
            extra: MessageExtra::Assistant {
                actions,
                raw_response: String::new(),
                cost: 0.0,
                timestamp: "t".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn local_execute_messages_returns_one_observation_per_action() {
        let env = Environment::from_config(EnvironmentConfig { timeout: 5, ..Default::default() })
            .await
            .unwrap();
        let assistant = assistant_with(&["echo one", "echo two"]);
        let outcome = env.execute_messages(&assistant, &json!({})).await.unwrap();
        match outcome {
            ExecOutcome::Observations(msgs) => {
                assert_eq!(msgs.len(), 2);
                assert!(msgs[0].content.contains('1') || msgs[0].content.contains("one"));
            }
            _ => panic!("expected observations"),
        }
    }

    #[tokio::test]
    async fn submission_sentinel_stops_before_later_actions() {
        let env = Environment::from_config(EnvironmentConfig { timeout: 5, ..Default::default() })
            .await
            .unwrap();
        let assistant = assistant_with(&[
            "printf 'COMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT\\nmy patch\\n'",
            "echo should_not_run",
        ]);
        let outcome = env.execute_messages(&assistant, &json!({})).await.unwrap();
        match outcome {
            ExecOutcome::Submitted { observations_before, submission } => {
                assert!(observations_before.is_empty());
                assert!(submission.contains("my patch"));
            }
            _ => panic!("expected submission"),
        }
    }

    #[tokio::test]
    async fn timeout_is_non_terminal_but_stops_the_turn() {
        let env = Environment::from_config(EnvironmentConfig { timeout: 1, ..Default::default() })
            .await
            .unwrap();
        let assistant = assistant_with(&["sleep 3", "echo after"]);
        let outcome = env.execute_messages(&assistant, &json!({})).await.unwrap();
        match outcome {
            ExecOutcome::Observations(msgs) => {
                assert_eq!(msgs.len(), 1, "no observation should be produced for actions after the timeout");
                assert!(matches!(msgs[0].extra, MessageExtra::TimeoutObservation { .. }));
            }
            _ => panic!("expected observations"),
        }
    }
}
