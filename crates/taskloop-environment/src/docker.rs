// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Docker container back-end.
//!
//! Grounded on `original_source/environments/docker.py::DockerEnvironment`:
//! the container is started once (`docker run -d --name ... -w cwd
//! run_args image sleep container_timeout`) and every action is executed
//! with `docker exec -w cwd -e K=V... container_id interpreter command`.
//! We shell out to the `docker` CLI rather than a client library — no repo
//! in the retrieval pack demonstrates a working `bollard` integration, and
//! the CLI surface matches the original one-to-one (documented in
//! DESIGN.md).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use taskloop_config::EnvironmentConfig;

use crate::backend::{Backend, RawExecOutput};
use crate::error::EnvError;
use crate::result::ExecutionResult;

pub struct DockerBackend {
    config: EnvironmentConfig,
    executable: String,
    container_id: tokio::sync::Mutex<Option<String>>,
}

impl DockerBackend {
    /// Start the container. Mirrors `_start_container`: `docker run -d
    /// --name minisweagent-<rand> -w cwd run_args image sleep
    /// container_timeout`.
    pub async fn start(config: EnvironmentConfig, executable: impl Into<String>) -> Result<Self, EnvError> {
        let executable = executable.into();
        let image = config
            .image
            .clone()
            .ok_or_else(|| EnvError::Backend("docker backend requires environment.image".to_string()))?;

        let container_name = format!("taskloop-{}", uuid::Uuid::new_v4().simple());
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            container_name,
            "-w".to_string(),
            config.cwd.clone(),
        ];
        args.extend(config.run_args.clone());
        args.push(image);
        args.push("sleep".to_string());
        args.push(config.container_timeout.to_string());

        let output = Command::new(&executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EnvError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(EnvError::Backend(format!(
                "failed to start container: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();

        Ok(Self { config, executable, container_id: tokio::sync::Mutex::new(Some(container_id)) })
    }
}

#[async_trait]
impl Backend for DockerBackend {
    async fn execute(
        &self,
        action: &str,
        cwd: Option<&str>,
        timeout: Option<u64>,
    ) -> Result<RawExecOutput, EnvError> {
        let container_id = self
            .container_id
            .lock()
            .await
            .clone()
            .ok_or_else(|| EnvError::Backend("container not started".to_string()))?;
        let effective_cwd = cwd.unwrap_or(&self.config.cwd);
        let effective_timeout = timeout.unwrap_or(self.config.timeout);

        let mut args = vec!["exec".to_string(), "-w".to_string(), effective_cwd.to_string()];
        for key in &self.config.forward_env {
            if let Ok(val) = std::env::var(key) {
                args.push("-e".to_string());
                args.push(format!("{key}={val}"));
            }
        }
        for (k, v) in &self.config.env {
            args.push("-e".to_string());
            args.push(format!("{k}={v}"));
        }
        args.push(container_id);
        args.extend(self.config.interpreter.clone());
        args.push(action.to_string());

        let mut cmd = Command::new(&self.executable);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| EnvError::Spawn(e.to_string()))?;

        match tokio::time::timeout(Duration::from_secs(effective_timeout), child.wait_with_output()).await {
            Ok(result) => {
                let output = result.map_err(|e| EnvError::Spawn(e.to_string()))?;
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(RawExecOutput::Completed(ExecutionResult {
                    output: text,
                    returncode: output.status.code().unwrap_or(-1),
                    exception_info: None,
                }))
            }
            Err(_) => Ok(RawExecOutput::TimedOut { partial_output: String::new() }),
        }
    }

    /// Stop and remove the container via a detached shell command so
    /// cleanup never blocks worker shutdown.
    async fn cleanup(&self) {
        let mut guard = self.container_id.lock().await;
        let Some(container_id) = guard.take() else { return };
        let shell_cmd = format!(
            "(timeout 60 {exe} stop {id} || {exe} rm -f {id}) >/dev/null 2>&1 &",
            exe = self.executable,
            id = container_id,
        );
        let _ = Command::new("sh")
            .arg("-c")
            .arg(shell_cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
    }
}
