// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Agent-loop error bands: FormatError/timeout/interruption are
//! handled inline by `step()` and never surface here. What remains is the
//! terminal-with-traceback band — a transport, environment, or template
//! failure that was not converted to a recoverable observation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("template error: {0}")]
    Template(String),
    #[error(transparent)]
    Model(#[from] taskloop_model::ModelError),
    #[error(transparent)]
    Environment(#[from] taskloop_environment::EnvError),
    #[error("failed to save trajectory: {0}")]
    Save(String),
}

impl AgentError {
    /// Short name used as `info.exit_status` for the terminal-with-traceback
    /// band, matching the Python original's `type(e).__name__`.
    pub fn exit_status_name(&self) -> &'static str {
        match self {
            AgentError::Template(_) => "TemplateError",
            AgentError::Model(_) => "ModelError",
            AgentError::Environment(_) => "EnvironmentError",
            AgentError::Save(_) => "SaveError",
        }
    }
}
