// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
fn default_true() -> bool {
    true
}

fn default_step_limit() -> u32 {
    0
}

fn default_cost_limit() -> f64 {
    0.0
}

fn default_system_template() -> String {
    "You are a helpful assistant that can interact with a computer to solve tasks.".to_string()
}

fn default_instance_template() -> String {
    "{{ task }}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_system_template")]
    pub system_template: String,
    #[serde(default = "default_instance_template")]
    pub instance_template: String,
    /// 0 disables the limit.
    #[serde(default = "default_step_limit")]
    pub step_limit: u32,
    /// 0.0 disables the limit.
    #[serde(default = "default_cost_limit")]
    pub cost_limit: f64,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_template: default_system_template(),
            instance_template: default_instance_template(),
            step_limit: default_step_limit(),
            cost_limit: default_cost_limit(),
            output_path: None,
        }
    }
}

/// `model.cost_tracking` — whether a cost-calculation failure aborts the
/// call or is swallowed and treated as zero cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CostTracking {
    #[default]
    Default,
    IgnoreErrors,
}

/// `model.set_cache_control` — whether to tag the last message segment with
/// an ephemeral cache-control marker on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheControl {
    #[default]
    None,
    DefaultEnd,
}

/// Action-extraction dialect. Text dialect parses a fenced code block with a
/// regex; tool-call dialect registers a single `bash` tool with the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    Text,
    ToolCall,
}

fn default_action_regex() -> String {
    r"(?s)```mswea_bash_command\s*\n(.*?)\n```".to_string()
}

fn default_legacy_action_regex() -> String {
    r"(?s)```bash\s*\n(.*?)\n```".to_string()
}

fn default_format_error_template() -> String {
    "Your last output did not contain exactly one action. Please output exactly one shell \
     command inside a fenced ```mswea_bash_command ... ``` block.\n\n\
     {% if actions|length == 0 %}No action was found.{% else %}Found {{ actions|length }} \
     candidate actions; only one is allowed per turn.{% endif %}"
        .to_string()
}

fn default_observation_template() -> String {
    "<returncode>{{ output.returncode }}</returncode>\n<output>\n{{ output.output }}\n</output>\
     {% if output.exception_info %}\n<exception>{{ output.exception_info }}</exception>{% endif %}"
        .to_string()
}

fn default_retry_stop_after_attempt() -> u32 {
    std::env::var("MSWEA_MODEL_RETRY_STOP_AFTER_ATTEMPT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default)]
    pub model_kwargs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub cost_tracking: CostTracking,
    #[serde(default)]
    pub set_cache_control: CacheControl,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default = "default_action_regex")]
    pub action_regex: String,
    #[serde(default = "default_legacy_action_regex")]
    pub legacy_action_regex: String,
    /// Accept the legacy ```bash fence in addition to the new
    /// ```mswea_bash_command fence.
    #[serde(default)]
    pub use_legacy_fence: bool,
    #[serde(default = "default_format_error_template")]
    pub format_error_template: String,
    #[serde(default = "default_observation_template")]
    pub observation_template: String,
    #[serde(default = "default_retry_stop_after_attempt")]
    pub retry_stop_after_attempt: u32,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_true")]
    pub stream: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            model_kwargs: HashMap::new(),
            cost_tracking: CostTracking::default(),
            set_cache_control: CacheControl::default(),
            dialect: Dialect::default(),
            action_regex: default_action_regex(),
            legacy_action_regex: default_legacy_action_regex(),
            use_legacy_fence: false,
            format_error_template: default_format_error_template(),
            observation_template: default_observation_template(),
            retry_stop_after_attempt: default_retry_stop_after_attempt(),
            api_key_env: None,
            base_url: None,
            stream: true,
        }
    }
}

/// Selects the `Environment` back-end. See taskloop-environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentClass {
    #[default]
    Local,
    Docker,
    Sandbox,
}

fn default_timeout() -> u64 {
    30
}

fn default_interpreter() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

fn default_timeout_template() -> String {
    "Command timed out. Partial output:\n{{ output }}".to_string()
}

fn default_action_observation_template() -> String {
    "<returncode>{{ output.returncode }}</returncode>\n<output>\n{{ output.output }}\n</output>"
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub environment_class: EnvironmentClass,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub forward_env: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,
    #[serde(default = "default_timeout_template")]
    pub timeout_template: String,
    #[serde(default = "default_action_observation_template")]
    pub action_observation_template: String,
    /// Container image (docker/sandbox dialects).
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub run_args: Vec<String>,
    #[serde(default = "default_timeout")]
    pub container_timeout: u64,
    /// Executable used by the sandbox back-end. Default `bwrap`.
    #[serde(default = "default_sandbox_executable")]
    pub sandbox_executable: String,
    /// Arguments passed to the sandbox executable before the per-command
    /// `--bind`/`--chdir`/`--setenv` flags.
    #[serde(default = "default_sandbox_args")]
    pub sandbox_args: Vec<String>,
}

fn default_sandbox_executable() -> String {
    "bwrap".to_string()
}

fn default_sandbox_args() -> Vec<String> {
    vec![
        "--ro-bind", "/usr", "/usr", "--ro-bind", "/bin", "/bin", "--ro-bind", "/lib", "/lib",
        "--tmpfs", "/tmp", "--proc", "/proc", "--dev", "/dev", "--unshare-all", "--share-net",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment_class: EnvironmentClass::default(),
            cwd: String::new(),
            env: HashMap::new(),
            forward_env: Vec::new(),
            timeout: default_timeout(),
            interpreter: default_interpreter(),
            timeout_template: default_timeout_template(),
            action_observation_template: default_action_observation_template(),
            image: None,
            run_args: Vec::new(),
            container_timeout: default_timeout(),
            sandbox_executable: default_sandbox_executable(),
            sandbox_args: default_sandbox_args(),
        }
    }
}

/// Interactive-variant mode (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InteractiveMode {
    Human,
    #[default]
    Confirm,
    Yolo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveConfig {
    #[serde(default)]
    pub mode: InteractiveMode,
    #[serde(default)]
    pub whitelist_actions: Vec<String>,
    #[serde(default = "default_true")]
    pub confirm_exit: bool,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            mode: InteractiveMode::default(),
            whitelist_actions: Vec::new(),
            confirm_exit: true,
        }
    }
}

fn default_worker_count() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_worker_count")]
    pub workers: usize,
    #[serde(default)]
    pub output_dir: String,
    /// If false, instances with an existing well-formed trajectory are skipped.
    #[serde(default)]
    pub redo_existing: bool,
    #[serde(default)]
    pub instance_filter: Option<String>,
    #[serde(default)]
    pub slice_start: Option<usize>,
    #[serde(default)]
    pub slice_end: Option<usize>,
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            output_dir: String::new(),
            redo_existing: false,
            instance_filter: None,
            slice_start: None,
            slice_end: None,
            shuffle_seed: None,
        }
    }
}

/// Whether the optional Memory subsystem (§4.H) is active. Experimental,
/// off by default per spec §9 Open Questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Number of most-recent messages kept uncompressed.
    #[serde(default = "default_keep_last_k")]
    pub keep_last_k: usize,
}

fn default_keep_last_k() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_last_k: default_keep_last_k(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub interactive: InteractiveConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}
