// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The interactive variant: wraps [`taskloop_core::Agent`] with
//! `human`/`confirm`/`yolo` modes, a whitelist of actions that bypass
//! confirmation, slash commands, and keyboard-interrupt handling.
//!
//! `interrupt_type` tags (`UserInterruption`, `UserRejection`,
//! `UserNewTask`) and the `/h /u /c /y` mode-command mapping are the
//! observable contract; the loop always emits observations for whatever
//! actions ran before an interrupt, even on a partial action list. Ctrl+C
//! is raced against the in-flight step via `tokio::select!`.

use regex::Regex;
use serde_json::Value;

use taskloop_config::{InteractiveConfig, InteractiveMode};
use taskloop_core::{ActOutcome, Agent, AgentError, TerminalInfo, ThinkOutcome};
use taskloop_model::{Action, Message, MessageExtra, Role};

use crate::interrupt::InterruptSignal;
use crate::prompter::Prompter;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// What to do with a proposed action at the confirm gate.
enum ConfirmDecision {
    Accept,
    AcceptAndSwitchYolo,
    SwitchHumanNoExec,
    Reject(String),
}

/// What to do with a line typed at the human-mode prompt.
enum HumanDecision {
    Command(String),
    SwitchConfirm,
    SwitchYolo,
    Eof,
}

/// What `next_turn()` decided should happen this iteration.
enum TurnResult {
    /// Run this assistant turn's actions through `Agent::act`.
    Act(Message),
    /// Nothing to execute this iteration; loop back into `next_turn()`.
    Loop,
    /// The run is over (limits exceeded while thinking).
    Done(TerminalInfo),
}

pub struct InteractiveAgent {
    agent: Agent,
    mode: InteractiveMode,
    confirm_exit: bool,
    whitelist: Vec<Regex>,
    prompter: Box<dyn Prompter>,
    interrupt: InterruptSignal,
}

impl InteractiveAgent {
    pub fn new(
        agent: Agent,
        config: InteractiveConfig,
        prompter: Box<dyn Prompter>,
        interrupt: InterruptSignal,
    ) -> Self {
        let whitelist = config
            .whitelist_actions
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "invalid whitelist_actions regex, ignoring");
                    None
                }
            })
            .collect();
        Self { agent, mode: config.mode, confirm_exit: config.confirm_exit, whitelist, prompter, interrupt }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    fn whitelisted(&self, actions: &[Action]) -> bool {
        actions.iter().all(|a| self.whitelist.iter().any(|re| re.is_match(&a.command)))
    }

    fn decide_confirm(text: &str) -> ConfirmDecision {
        match text.trim() {
            "" | "y" | "Y" | "/c" => ConfirmDecision::Accept,
            "/y" => ConfirmDecision::AcceptAndSwitchYolo,
            "/u" | "/h" => ConfirmDecision::SwitchHumanNoExec,
            other => ConfirmDecision::Reject(other.to_string()),
        }
    }

    fn decide_human(text: Option<String>) -> HumanDecision {
        match text {
            None => HumanDecision::Eof,
            Some(t) => match t.trim() {
                "/c" => HumanDecision::SwitchConfirm,
                "/y" => HumanDecision::SwitchYolo,
                _ => HumanDecision::Command(t),
            },
        }
    }

    fn announce_mode(&self, mode: InteractiveMode) {
        let name = match mode {
            InteractiveMode::Human => "human",
            InteractiveMode::Confirm => "confirm",
            InteractiveMode::Yolo => "yolo",
        };
        tracing::info!(mode = name, "switched interactive mode");
    }

    fn synth_assistant(&mut self, command: String) -> Message {
        let msg = Message {
            role: Role::Assistant,
            content: command.clone(),
            extra: MessageExtra::Assistant {
                actions: vec![Action { command, tool_call_id: None }],
                raw_response: String::new(),
                cost: 0.0,
                timestamp: now(),
            },
        };
        self.agent.push_message(msg.clone());
        msg
    }

    /// Run until termination. Mirrors `Agent::run`'s Init/save-on-every-step
    /// behavior while interposing mode handling between Think and Act.
    pub async fn run(&mut self, task: &str) -> Result<TerminalInfo, AgentError> {
        self.agent.init(task)?;
        self.agent.checkpoint(&Value::Null)?;

        loop {
            let assistant = match self.next_turn().await? {
                TurnResult::Loop => continue,
                TurnResult::Done(terminal) => {
                    let info = serde_json::json!({
                        "exit_status": terminal.exit_status,
                        "submission": terminal.submission,
                    });
                    self.agent.checkpoint(&info)?;
                    self.agent.cleanup().await;
                    return Ok(terminal);
                }
                TurnResult::Act(msg) => msg,
            };

            match self.agent.act(&assistant).await? {
                ActOutcome::Continue => {
                    self.agent.checkpoint(&Value::Null)?;
                }
                ActOutcome::Terminal(terminal) => {
                    if terminal.exit_status == "Submitted" && self.confirm_exit {
                        if let Some(new_task) = self.confirm_submission().await {
                            self.agent.pop_message();
                            self.agent.push_message(Message {
                                role: Role::User,
                                content: new_task.clone(),
                                extra: MessageExtra::UserNewTask { task: new_task, timestamp: now() },
                            });
                            self.agent.checkpoint(&Value::Null)?;
                            continue;
                        }
                    }
                    let info = serde_json::json!({
                        "exit_status": terminal.exit_status,
                        "submission": terminal.submission,
                    });
                    self.agent.checkpoint(&info)?;
                    self.agent.cleanup().await;
                    return Ok(terminal);
                }
            }
        }
    }

    /// Produce the next assistant turn, or a `Loop`/`Done` directive for the
    /// caller.
    async fn next_turn(&mut self) -> Result<TurnResult, AgentError> {
        match self.mode {
            InteractiveMode::Human => Ok(self.human_turn().await),
            InteractiveMode::Confirm | InteractiveMode::Yolo => self.model_driven_turn().await,
        }
    }

    async fn human_turn(&mut self) -> TurnResult {
        let line = self.prompter.prompt_line("(human) $ ").await;
        match Self::decide_human(line) {
            HumanDecision::Eof => {
                TurnResult::Done(TerminalInfo { exit_status: "UserInterruption".to_string(), submission: None })
            }
            HumanDecision::SwitchConfirm => {
                self.mode = InteractiveMode::Confirm;
                self.announce_mode(self.mode);
                TurnResult::Loop
            }
            HumanDecision::SwitchYolo => {
                self.mode = InteractiveMode::Yolo;
                self.announce_mode(self.mode);
                TurnResult::Loop
            }
            HumanDecision::Command(cmd) => TurnResult::Act(self.synth_assistant(cmd)),
        }
    }

    async fn model_driven_turn(&mut self) -> Result<TurnResult, AgentError> {
        tokio::select! {
            biased;
            _ = self.interrupt.0.recv() => {
                self.handle_interrupt().await;
                Ok(TurnResult::Loop)
            }
            outcome = self.agent.think() => {
                match outcome? {
                    ThinkOutcome::Terminal(terminal) => Ok(TurnResult::Done(terminal)),
                    ThinkOutcome::Recovered => Ok(TurnResult::Loop),
                    ThinkOutcome::Assistant(msg) => self.gate(msg).await,
                }
            }
        }
    }

    /// Apply the confirm gate (no-op in yolo mode or when every action is
    /// whitelisted).
    async fn gate(&mut self, assistant: Message) -> Result<TurnResult, AgentError> {
        if self.mode == InteractiveMode::Yolo || self.whitelisted(assistant.actions()) {
            return Ok(TurnResult::Act(assistant));
        }
        let prompt = format!("Run `{}`? [Enter/y accept, /u human, /y yolo, else reject]\n> ", assistant.content);
        let reply = self.prompter.prompt_line(&prompt).await.unwrap_or_default();
        match Self::decide_confirm(&reply) {
            ConfirmDecision::Accept => Ok(TurnResult::Act(assistant)),
            ConfirmDecision::AcceptAndSwitchYolo => {
                self.mode = InteractiveMode::Yolo;
                self.announce_mode(self.mode);
                Ok(TurnResult::Act(assistant))
            }
            ConfirmDecision::SwitchHumanNoExec => {
                self.mode = InteractiveMode::Human;
                self.announce_mode(self.mode);
                Ok(TurnResult::Loop)
            }
            ConfirmDecision::Reject(text) => {
                self.agent.push_message(Message {
                    role: Role::User,
                    content: text.clone(),
                    extra: MessageExtra::UserRejection { message: text, timestamp: now() },
                });
                Ok(TurnResult::Loop)
            }
        }
    }

    async fn handle_interrupt(&mut self) {
        let typed = self.prompter.prompt_line("\n[interrupted] type a message, or press Enter to continue> ").await;
        let message = match typed {
            Some(t) if !t.trim().is_empty() => t,
            _ => "Transient interruption; no message supplied.".to_string(),
        };
        self.agent.push_message(Message {
            role: Role::User,
            content: message.clone(),
            extra: MessageExtra::UserInterruption { message, timestamp: now() },
        });
    }

    /// Prompt whether to accept the submission; `Some(new_task)` continues
    /// the run with a fresh instruction instead of terminating.
    async fn confirm_submission(&mut self) -> Option<String> {
        let reply = self
            .prompter
            .prompt_line("Task submitted. Press Enter to accept, or type a new task to continue> ")
            .await?;
        if reply.trim().is_empty() {
            None
        } else {
            Some(reply)
        }
    }
}
