// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The seam between the orchestrator and one instance's Agent+Model+
//! Environment triple. Kept abstract the same way `CompletionBackend` is
//! kept abstract in `taskloop-model` — concrete construction (which model,
//! which repo checkout) is an external collaborator per spec §1.

use async_trait::async_trait;
use thiserror::Error;

use taskloop_core::TerminalInfo;

use crate::instance::Instance;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("building agent for instance failed: {0}")]
    Build(String),
    #[error(transparent)]
    Agent(#[from] taskloop_core::AgentError),
    #[error("instance task panicked")]
    Panicked,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Drives exactly one instance to completion: build an Agent for it and run
/// it against `output_path`. One call = one instance's full lifecycle.
#[async_trait]
pub trait InstanceRunner: Send + Sync {
    async fn run_instance(&self, instance: &Instance, output_path: std::path::PathBuf) -> Result<TerminalInfo, BatchError>;
}
