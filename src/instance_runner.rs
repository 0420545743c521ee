// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Wires one batch instance to a fresh Agent+Model+Environment triple (spec
//! §4.F: "each task is an independent Agent+Model+Environment triple"). The
//! CLI's only implementation of `taskloop_batch::InstanceRunner`.

use std::path::PathBuf;

use async_trait::async_trait;

use taskloop_batch::{BatchError, Instance, InstanceRunner};
use taskloop_config::Config;
use taskloop_core::{Agent, TerminalInfo};
use taskloop_environment::Environment;

use crate::model_factory::build_model;

/// Builds a fresh `Agent` per instance from a shared base config, overriding
/// `agent.output_path` and the instance template's `task` with the
/// instance's own values.
pub struct ConfigInstanceRunner {
    base_config: Config,
}

impl ConfigInstanceRunner {
    pub fn new(base_config: Config) -> Self {
        Self { base_config }
    }
}

#[async_trait]
impl InstanceRunner for ConfigInstanceRunner {
    async fn run_instance(&self, instance: &Instance, output_path: PathBuf) -> Result<TerminalInfo, BatchError> {
        let mut agent_config = self.base_config.agent.clone();
        agent_config.output_path = Some(output_path.display().to_string());

        let model = build_model(&self.base_config.model);
        let env = Environment::from_config(self.base_config.environment.clone())
            .await
            .map_err(|e| BatchError::Build(e.to_string()))?;

        let mut agent = Agent::new(model, env, agent_config);
        let terminal = agent.run(&instance.task).await?;
        Ok(terminal)
    }
}
