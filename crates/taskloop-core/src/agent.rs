// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent loop: `run`/`step` drive the LM ↔ shell cycle,
//! with a save-on-every-step invariant and the two-band error handling of
//! spec §7 (FormatError is recovered inline; everything else that's not
//! `Submitted`/`LimitsExceeded` is terminal-with-traceback).
//!
//! Grounded on `original_source/agents/default.py::DefaultAgent` for the
//! loop's control flow — `run`/`step`/`query`/`execute_actions`/`save` map
//! one-to-one onto [`Agent::run`]/[`Agent::step`], with the Python
//! try/except/finally translated into the `Result`-returning loop body
//! below plus an unconditional `save_trajectory` call on every exit.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use taskloop_config::AgentConfig;
use taskloop_environment::{Environment, ExecOutcome};
use taskloop_model::{Message, Model, QueryError};

use crate::error::AgentError;
use crate::merge::recursive_merge;
use crate::trajectory;

/// What the run loop does after one `step()` call.
enum StepOutcome {
    Continue,
    Terminal(TerminalInfo),
}

/// Result of the Think half of a turn, split out of
/// `step()` so the interactive variant can interpose a
/// confirmation prompt between Think and Act.
pub enum ThinkOutcome {
    /// The model produced an assistant turn with parsed actions ready to
    /// execute. Already appended to the message log.
    Assistant(Message),
    /// A format error was recovered inline; the recovery message is already
    /// appended and the caller should loop back into `think()` again.
    Recovered,
    /// `step_limit`/`cost_limit` was hit before querying the model.
    Terminal(TerminalInfo),
}

/// Result of the Act half of a turn.
pub enum ActOutcome {
    /// Observation messages were appended; the caller should loop back into
    /// `think()`.
    Continue,
    /// The submission sentinel was detected; the exit message is already
    /// appended.
    Terminal(TerminalInfo),
}

/// Final state of a run: `info.exit_status` / `info.submission` in the
/// trajectory.
#[derive(Debug, Clone)]
pub struct TerminalInfo {
    pub exit_status: String,
    pub submission: Option<String>,
}

pub struct Agent {
    config: AgentConfig,
    model: Model,
    env: Environment,
    messages: Vec<Message>,
    extra_template_vars: Value,
    output_path: Option<PathBuf>,
}

impl Agent {
    pub fn new(model: Model, env: Environment, config: AgentConfig) -> Self {
        let output_path = config.output_path.as_ref().map(PathBuf::from);
        Self { config, model, env, messages: Vec::new(), extra_template_vars: json!({}), output_path }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn extra_template_vars(&self) -> &Value {
        &self.extra_template_vars
    }

    /// Append a message directly to the log (used by the interactive
    /// variant to inject human-typed turns and rejection/interrupt
    /// messages without going through `think()`/`act()`).
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove and return the last message in the log (used by the
    /// interactive variant to retract the `exit` message that `act()`
    /// appended on `Submitted` when the user converts it into a new task).
    pub fn pop_message(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    /// Render the system/instance templates against `task` and reset the
    /// log to `[system, instance]`. Exposed so callers that drive their own
    /// loop (the interactive variant) can reuse the same Init behavior as
    /// `run()`.
    pub fn init(&mut self, task: &str) -> Result<(), AgentError> {
        self.extra_template_vars = json!({ "task": task });
        self.messages.clear();
        let system = self.render(&self.config.system_template)?;
        self.messages.push(Message::system(system));
        let instance = self.render(&self.config.instance_template)?;
        self.messages.push(Message::user(instance));
        Ok(())
    }

    /// Save the trajectory to `output_path` (if configured) and return the
    /// serialized value either way. Exposed for callers driving their own
    /// loop around `think()`/`act()`.
    pub fn checkpoint(&self, extra: &Value) -> Result<Value, AgentError> {
        self.save_trajectory(extra)
    }

    pub async fn cleanup(&self) {
        self.env.cleanup().await;
    }

    fn template_vars(&self) -> Value {
        let agent_vars = serde_json::to_value(&self.config).unwrap_or_else(|_| json!({}));
        let env_vars = self.env.template_vars(&json!({}));
        recursive_merge(&[agent_vars, env_vars, self.extra_template_vars.clone()])
    }

    fn render(&self, template: &str) -> Result<String, AgentError> {
        taskloop_template::render(template, &self.template_vars()).map_err(|e| AgentError::Template(e.to_string()))
    }

    pub fn limits_exceeded(&self) -> bool {
        (self.config.step_limit > 0 && self.model.n_calls() >= self.config.step_limit as u64)
            || (self.config.cost_limit > 0.0 && self.model.cost() >= self.config.cost_limit)
    }

    /// Run the agent against `task` until termination, saving the
    /// trajectory after every step.
    pub async fn run(&mut self, task: &str) -> Result<TerminalInfo, AgentError> {
        self.init(task)?;
        self.save_trajectory(&Value::Null)?;

        loop {
            match self.step().await {
                Ok(StepOutcome::Continue) => {
                    self.save_trajectory(&Value::Null)?;
                }
                Ok(StepOutcome::Terminal(terminal)) => {
                    let info = json!({ "exit_status": terminal.exit_status, "submission": terminal.submission });
                    self.save_trajectory(&info)?;
                    self.env.cleanup().await;
                    return Ok(terminal);
                }
                Err(err) => {
                    let info = json!({
                        "exit_status": err.exit_status_name(),
                        "submission": err.to_string(),
                        "traceback": format!("{err:?}"),
                    });
                    self.save_trajectory(&info)?;
                    self.env.cleanup().await;
                    return Err(err);
                }
            }
        }
    }

    /// One Think→Act→Observed cycle. Recoverable failures (format errors)
    /// are handled inline and surface as `Ok(StepOutcome::Continue)` with
    /// the recovery message already appended; everything else propagates.
    async fn step(&mut self) -> Result<StepOutcome, AgentError> {
        let assistant = match self.think().await? {
            ThinkOutcome::Terminal(t) => return Ok(StepOutcome::Terminal(t)),
            ThinkOutcome::Recovered => return Ok(StepOutcome::Continue),
            ThinkOutcome::Assistant(msg) => msg,
        };
        match self.act(&assistant).await? {
            ActOutcome::Continue => Ok(StepOutcome::Continue),
            ActOutcome::Terminal(t) => Ok(StepOutcome::Terminal(t)),
        }
    }

    /// The Think half of a turn: check limits, query the model, and append
    /// the assistant (or recovery) message. Format errors are handled
    /// inline; everything else propagates. Public so the interactive
    /// variant can interpose a confirmation prompt before `act()`.
    pub async fn think(&mut self) -> Result<ThinkOutcome, AgentError> {
        if self.limits_exceeded() {
            return Ok(ThinkOutcome::Terminal(TerminalInfo {
                exit_status: "LimitsExceeded".to_string(),
                submission: None,
            }));
        }

        let assistant = match self.model.query(&self.messages).await {
            Ok(msg) => msg,
            Err(QueryError::Format(format_error)) => {
                self.messages.push(format_error.into_message());
                return Ok(ThinkOutcome::Recovered);
            }
            Err(QueryError::Transport(e)) => return Err(AgentError::Model(e)),
        };
        self.messages.push(assistant.clone());
        Ok(ThinkOutcome::Assistant(assistant))
    }

    /// The Act/Observed half of a turn: execute `assistant`'s actions and
    /// append the resulting observations (or the exit message on
    /// submission). `assistant` must already be the last message pushed by
    /// `think()` (or an equivalent caller-synthesized turn).
    pub async fn act(&mut self, assistant: &Message) -> Result<ActOutcome, AgentError> {
        let vars = self.extra_template_vars.clone();
        match self.env.execute_messages(assistant, &vars).await {
            Ok(ExecOutcome::Observations(observations)) => {
                self.messages.extend(observations);
                Ok(ActOutcome::Continue)
            }
            Ok(ExecOutcome::Submitted { observations_before, submission }) => {
                self.messages.extend(observations_before);
                self.messages.push(Message::exit("Submitted", Some(submission.clone())));
                Ok(ActOutcome::Terminal(TerminalInfo {
                    exit_status: "Submitted".to_string(),
                    submission: Some(submission),
                }))
            }
            Err(e) => Err(AgentError::Environment(e)),
        }
    }

    pub fn serialize(&self) -> Value {
        json!({
            "info": {
                "config": { "agent": self.config, "agent_type": "taskloop_core.agent.Agent" },
            },
            "messages": self.messages,
        })
    }

    fn save_trajectory(&self, extra: &Value) -> Result<Value, AgentError> {
        let mut parts = vec![self.serialize(), self.model.serialize(), self.env.serialize()];
        if !extra.is_null() {
            parts.push(json!({ "info": extra }));
        }
        let data = trajectory::build(&parts);
        if let Some(path) = &self.output_path {
            trajectory::write_atomic(path, &data)?;
        }
        Ok(data)
    }

    /// Save regardless of whether `output_path` is configured, returning
    /// the full serialized trajectory either way.
    pub fn save(&self, path: Option<&Path>, extra: &[Value]) -> Result<Value, AgentError> {
        let mut parts = vec![self.serialize(), self.model.serialize(), self.env.serialize()];
        parts.extend(extra.iter().cloned());
        let data = trajectory::build(&parts);
        if let Some(path) = path {
            trajectory::write_atomic(path, &data)?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json as j;
    use taskloop_config::{Dialect, EnvironmentConfig, ModelConfig};
    use taskloop_model::mock::ScriptedBackend;
    use taskloop_model::provider::{CompletionResponse, Usage};

    fn model_with_responses(responses: Vec<CompletionResponse>) -> Model {
        let mut config = ModelConfig { model_name: "mock".into(), dialect: Dialect::Text, ..Default::default() };
        config.model_kwargs.insert("price_per_1k_prompt".into(), j!(0.0));
        config.model_kwargs.insert("price_per_1k_completion".into(), j!(0.0));
        config.cost_tracking = taskloop_config::CostTracking::IgnoreErrors;
        Model::new(config, Arc::new(ScriptedBackend::new(responses)))
    }

    async fn env() -> Environment {
        Environment::from_config(EnvironmentConfig { timeout: 5, ..Default::default() }).await.unwrap()
    }

    fn response(content: &str) -> CompletionResponse {
        CompletionResponse { content: content.to_string(), tool_calls: vec![], usage: Usage::default(), raw: j!({}) }
    }

    #[tokio::test]
    async fn run_submits_and_records_terminal_info() {
        let model = model_with_responses(vec![response(
            "```mswea_bash_command\nprintf 'COMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT\\ndone\\n'\n```",
        )]);
        let config = AgentConfig {
            system_template: "system".to_string(),
            instance_template: "{{ task }}".to_string(),
            ..Default::default()
        };
        let mut agent = Agent::new(model, env().await, config);
        let terminal = agent.run("solve it").await.unwrap();
        assert_eq!(terminal.exit_status, "Submitted");
        assert_eq!(terminal.submission.as_deref(), Some("done\n"));
        assert_eq!(agent.messages()[0].role, taskloop_model::Role::System);
        assert_eq!(agent.messages().last().unwrap().role, taskloop_model::Role::Exit);
    }

    #[tokio::test]
    async fn format_error_is_recovered_and_loop_continues() {
        let model = model_with_responses(vec![
            response("no fenced command here"),
            response("```mswea_bash_command\nprintf 'COMPLETE_TASK_AND_SUBMIT_FINAL_OUTPUT\\nok\\n'\n```"),
        ]);
        let config = AgentConfig {
            system_template: "system".to_string(),
            instance_template: "{{ task }}".to_string(),
            ..Default::default()
        };
        let mut agent = Agent::new(model, env().await, config);
        let terminal = agent.run("solve it").await.unwrap();
        assert_eq!(terminal.exit_status, "Submitted");
        let has_format_error =
            agent.messages().iter().any(|m| matches!(m.extra, taskloop_model::MessageExtra::FormatError { .. }));
        assert!(has_format_error);
    }

    #[tokio::test]
    async fn step_limit_of_one_raises_limits_exceeded_before_second_call() {
        let model = model_with_responses(vec![response("```mswea_bash_command\necho hi\n```")]);
        let config = AgentConfig {
            system_template: "system".to_string(),
            instance_template: "{{ task }}".to_string(),
            step_limit: 1,
            ..Default::default()
        };
        let mut agent = Agent::new(model, env().await, config);
        let terminal = agent.run("solve it").await.unwrap();
        assert_eq!(terminal.exit_status, "LimitsExceeded");
    }
}
