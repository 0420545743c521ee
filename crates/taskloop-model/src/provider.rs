// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The abstract model client contract.
//!
//! `CompletionBackend` is the one seam pushed out of core scope: specific
//! transport implementations for individual LM providers are someone
//! else's problem. Everything else in this module — dialect dispatch,
//! retry, cost accounting, cache-control, streaming guard — is core and
//! lives here regardless of which backend is plugged in.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use taskloop_config::{Dialect, ModelConfig};

use crate::dialect::{text, toolcall};
use crate::error::{FormatError, ModelError};
use crate::message::{Action, Message, MessageExtra, Role};
use crate::retry::retry;
use crate::stats::{GlobalModelStats, InstanceModelStats, ModelStats};

/// Token usage reported for one completion call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One raw completion from a [`CompletionBackend`], before dialect parsing.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Assistant text content (empty in pure tool-call responses).
    pub content: String,
    pub tool_calls: Vec<toolcall::RawToolCall>,
    pub usage: Usage,
    /// Full raw provider response, stored verbatim in `extra.raw_response`.
    pub raw: Value,
}

/// The one seam left abstract by this spec: sending a wire-format message
/// list (already cache-control-tagged) to a concrete provider and getting
/// a completion back.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[Value], tools: &[Value]) -> Result<CompletionResponse, ModelError>;
}

/// Computes the dollar cost of one completion. Kept pluggable since actual
/// provider pricing tables are themselves a transport-layer concern (out of
/// scope per spec §1); the default implementation is a simple
/// per-token calculator driven by `model_kwargs.price_per_1k_*`.
pub trait CostCalculator: Send + Sync {
    fn cost(&self, config: &ModelConfig, usage: &Usage) -> Result<f64, ModelError>;
}

/// Default calculator: reads `price_per_1k_prompt` / `price_per_1k_completion`
/// from `model_kwargs` (USD per 1000 tokens). Missing price entries are
/// treated as a cost-calculation failure, matching the teacher's
/// "cost must be registered" requirement from `litellm_model.py`.
pub struct TableCostCalculator;

impl CostCalculator for TableCostCalculator {
    fn cost(&self, config: &ModelConfig, usage: &Usage) -> Result<f64, ModelError> {
        let prompt_price = config
            .model_kwargs
            .get("price_per_1k_prompt")
            .and_then(Value::as_f64)
            .ok_or_else(|| ModelError::CostCalculation("no price_per_1k_prompt configured".into()))?;
        let completion_price = config
            .model_kwargs
            .get("price_per_1k_completion")
            .and_then(Value::as_f64)
            .ok_or_else(|| ModelError::CostCalculation("no price_per_1k_completion configured".into()))?;
        let cost = (usage.prompt_tokens as f64 / 1000.0) * prompt_price
            + (usage.completion_tokens as f64 / 1000.0) * completion_price;
        if cost <= 0.0 {
            return Err(ModelError::CostCalculation(format!("cost must be > 0.0, got {cost}")));
        }
        Ok(cost)
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Transport(#[from] ModelError),
}

/// The model client: dialect dispatch, retry, cost accounting, cache
/// control, and observation formatting around an abstract
/// [`CompletionBackend`].
pub struct Model {
    pub config: ModelConfig,
    backend: Arc<dyn CompletionBackend>,
    cost_calc: Arc<dyn CostCalculator>,
    stats: InstanceModelStats,
}

impl Model {
    pub fn new(config: ModelConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self { config, backend, cost_calc: Arc::new(TableCostCalculator), stats: InstanceModelStats::default() }
    }

    pub fn with_cost_calculator(mut self, calc: Arc<dyn CostCalculator>) -> Self {
        self.cost_calc = calc;
        self
    }

    pub fn n_calls(&self) -> u64 {
        self.stats.snapshot().api_calls
    }

    pub fn cost(&self) -> f64 {
        self.stats.snapshot().instance_cost
    }

    pub fn model_stats(&self) -> ModelStats {
        self.stats.snapshot()
    }

    /// Canonicalize a message for the log. The default implementation is an
    /// identity pass-through; multimodal expansion of image markers, when
    /// configured, happens here in provider-specific clients.
    pub fn format_message(&self, role: Role, content: String) -> Message {
        Message { role, content, extra: MessageExtra::None }
    }

    /// Query the model: builds the wire payload, applies the cache-control
    /// marker, retries transient failures, computes cost, and parses
    /// actions for the configured dialect. Always attaches a populated
    /// `extra.actions` list on success.
    pub async fn query(&self, messages: &[Message]) -> Result<Message, QueryError> {
        let wire_messages = to_wire(messages);
        let wire_messages = crate::cache_control::apply(self.config.set_cache_control, wire_messages);
        let tools = match self.config.dialect {
            Dialect::ToolCall => vec![toolcall::bash_tool_schema()],
            Dialect::Text => vec![],
        };

        let response = retry(self.config.retry_stop_after_attempt, || {
            self.backend.complete(&wire_messages, &tools)
        })
        .await?;

        let actions = self.parse_actions(&response)?;

        let usage = response.usage;
        let cost = match self.cost_calc.cost(&self.config, &usage) {
            Ok(c) => c,
            Err(e) if self.config.cost_tracking == taskloop_config::CostTracking::IgnoreErrors => {
                tracing::warn!(error = %e, "cost calculation failed, treating as zero cost");
                0.0
            }
            Err(e) => return Err(QueryError::Transport(e)),
        };

        self.stats.add(cost);
        GlobalModelStats::add(cost);

        Ok(Message {
            role: Role::Assistant,
            content: response.content.clone(),
            extra: MessageExtra::Assistant {
                actions,
                raw_response: response.raw.to_string(),
                cost,
                timestamp: crate::now_timestamp(),
            },
        })
    }

    fn parse_actions(&self, response: &CompletionResponse) -> Result<Vec<Action>, FormatError> {
        match self.config.dialect {
            Dialect::Text => {
                let legacy = self.config.use_legacy_fence.then_some(self.config.legacy_action_regex.as_str());
                text::parse_regex_actions(
                    &response.content,
                    &self.config.action_regex,
                    legacy,
                    &self.config.format_error_template,
                )
            }
            Dialect::ToolCall => {
                toolcall::parse_toolcall_actions(&response.tool_calls, &self.config.format_error_template)
            }
        }
    }

    /// Pair each action in `assistant` with its output and render the
    /// observation body, dispatching on dialect for role/id conventions.
    pub fn format_observation_messages(
        &self,
        assistant: &Message,
        outputs: &[Value],
        template_vars: &Value,
    ) -> Result<Vec<Message>, FormatError> {
        match self.config.dialect {
            Dialect::Text => text::format_observation_messages(outputs, &self.config.observation_template, template_vars),
            Dialect::ToolCall => toolcall::format_observation_messages(
                assistant.actions(),
                outputs,
                &self.config.observation_template,
                template_vars,
            ),
        }
    }

    /// Serialized view consumed by the Trajectory Store.
    pub fn serialize(&self) -> Value {
        let stats = self.stats.snapshot();
        json!({
            "info": {
                "config": {
                    "model": self.config,
                    "model_type": "taskloop_model.Model",
                },
                "model_stats": {
                    "instance_cost": stats.instance_cost,
                    "api_calls": stats.api_calls,
                },
            },
        })
    }
}

/// Build the wire-format message array (role + content only; `extra` is a
/// local-log-only field and never sent to the provider).
fn to_wire(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
                Role::Exit => "exit",
            };
            let mut obj = json!({ "role": role, "content": m.content });
            if let MessageExtra::ToolObservation { tool_call_id, .. } = &m.extra {
                obj["tool_call_id"] = json!(tool_call_id);
            }
            obj
        })
        .collect()
}
