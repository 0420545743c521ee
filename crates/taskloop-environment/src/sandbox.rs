// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `bwrap` sandbox back-end.
//!
//! Grounded on `original_source/environments/extra/bubblewrap.py`: each
//! instance gets its own scratch working directory under the system temp
//! dir, every command is wrapped as `bwrap <sandbox_args> --bind cwd cwd
//! --chdir cwd --setenv K V... interpreter command`, and the working
//! directory is removed on cleanup.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use taskloop_config::EnvironmentConfig;

use crate::backend::{Backend, RawExecOutput};
use crate::error::EnvError;
use crate::local::drain_into;
use crate::result::ExecutionResult;

pub struct SandboxBackend {
    config: EnvironmentConfig,
    working_dir: std::path::PathBuf,
}

impl SandboxBackend {
    pub fn new(config: EnvironmentConfig) -> Result<Self, EnvError> {
        let working_dir =
            std::env::temp_dir().join(format!("taskloop-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&working_dir)
            .map_err(|e| EnvError::Backend(format!("failed to create sandbox working dir: {e}")))?;
        Ok(Self { config, working_dir })
    }

    fn effective_cwd(&self, cwd: Option<&str>) -> String {
        if let Some(c) = cwd {
            return c.to_string();
        }
        if !self.config.cwd.is_empty() {
            return self.config.cwd.clone();
        }
        self.working_dir.to_string_lossy().into_owned()
    }
}

#[async_trait]
impl Backend for SandboxBackend {
    async fn execute(
        &self,
        action: &str,
        cwd: Option<&str>,
        timeout: Option<u64>,
    ) -> Result<RawExecOutput, EnvError> {
        let effective_cwd = self.effective_cwd(cwd);
        let effective_timeout = timeout.unwrap_or(self.config.timeout);

        let mut args = self.config.sandbox_args.clone();
        args.extend([
            "--bind".to_string(),
            effective_cwd.clone(),
            effective_cwd.clone(),
            "--chdir".to_string(),
            effective_cwd,
        ]);
        for (k, v) in &self.config.env {
            args.push("--setenv".to_string());
            args.push(k.clone());
            args.push(v.clone());
        }
        args.extend(self.config.interpreter.clone());
        args.push(action.to_string());

        let mut cmd = Command::new(&self.config.sandbox_executable);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| EnvError::Spawn(e.to_string()))?;
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let out_buf = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let err_buf = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));

        // Drain incrementally rather than `wait_with_output`, which only
        // yields output once the process has exited and so can never
        // surface partial output on a timeout.
        let stdout_task = tokio::spawn(drain_into(stdout, out_buf.clone()));
        let stderr_task = tokio::spawn(drain_into(stderr, err_buf.clone()));

        match tokio::time::timeout(Duration::from_secs(effective_timeout), child.wait()).await {
            Ok(result) => {
                let status = result.map_err(|e| EnvError::Spawn(e.to_string()))?;
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                let out = out_buf.lock().await;
                let err = err_buf.lock().await;
                let mut text = String::from_utf8_lossy(&out).into_owned();
                text.push_str(&String::from_utf8_lossy(&err));
                Ok(RawExecOutput::Completed(ExecutionResult {
                    output: text,
                    returncode: status.code().unwrap_or(-1),
                    exception_info: None,
                }))
            }
            Err(_) => {
                let _ = child.start_kill();
                let _ = tokio::time::timeout(
                    Duration::from_millis(200),
                    async { tokio::join!(stdout_task, stderr_task) },
                )
                .await;
                let out = out_buf.lock().await;
                let err = err_buf.lock().await;
                let mut partial_output = String::from_utf8_lossy(&out).into_owned();
                partial_output.push_str(&String::from_utf8_lossy(&err));
                Ok(RawExecOutput::TimedOut { partial_output })
            }
        }
    }

    async fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.working_dir);
    }
}
