// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Local shell back-end: runs the configured interpreter argv against a
//! command string via `tokio::process::Command` + `tokio::time::timeout`,
//! merging stdout/stderr into a single `{output, returncode}` result.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use taskloop_config::EnvironmentConfig;

use crate::backend::{Backend, RawExecOutput};
use crate::error::EnvError;
use crate::result::ExecutionResult;

pub struct LocalBackend {
    pub config: EnvironmentConfig,
}

impl LocalBackend {
    pub fn new(config: EnvironmentConfig) -> Self {
        Self { config }
    }
}

/// Build the env map for one command: `forward_env` entries present on the
/// host, then `config.env` overlaid (config wins on collision), per
/// spec §4.B.
pub fn build_env(config: &EnvironmentConfig) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for key in &config.forward_env {
        if let Ok(val) = std::env::var(key) {
            env.insert(key.clone(), val);
        }
    }
    for (k, v) in &config.env {
        env.insert(k.clone(), v.clone());
    }
    env
}

#[async_trait]
impl Backend for LocalBackend {
    async fn execute(
        &self,
        action: &str,
        cwd: Option<&str>,
        timeout: Option<u64>,
    ) -> Result<RawExecOutput, EnvError> {
        let effective_cwd = cwd.unwrap_or(&self.config.cwd);
        let effective_timeout = timeout.unwrap_or(self.config.timeout);

        let (program, prefix_args) = self
            .config
            .interpreter
            .split_first()
            .ok_or_else(|| EnvError::Spawn("empty interpreter argv".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(prefix_args);
        cmd.arg(action);
        if !effective_cwd.is_empty() {
            cmd.current_dir(effective_cwd);
        }
        for (k, v) in build_env(&self.config) {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| EnvError::Spawn(e.to_string()))?;
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let out_buf = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let err_buf = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));

        // Drain stdout/stderr incrementally into the shared buffers on their
        // own tasks, independent of `child.wait()`. This way a timeout that
        // fires while the command is still running finds whatever output has
        // already been read sitting in the buffers, instead of losing it to
        // a `read_to_end` future that never got to complete.
        let stdout_task = tokio::spawn(drain_into(stdout, out_buf.clone()));
        let stderr_task = tokio::spawn(drain_into(stderr, err_buf.clone()));

        match tokio::time::timeout(Duration::from_secs(effective_timeout), child.wait()).await {
            Ok(status) => {
                let status = status.map_err(|e| EnvError::Spawn(e.to_string()))?;
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                let out = out_buf.lock().await;
                let err = err_buf.lock().await;
                let mut output = String::from_utf8_lossy(&out).into_owned();
                output.push_str(&String::from_utf8_lossy(&err));
                Ok(RawExecOutput::Completed(ExecutionResult {
                    output,
                    returncode: status.code().unwrap_or(-1),
                    exception_info: None,
                }))
            }
            Err(_) => {
                let _ = child.start_kill();
                // Give the drain tasks a brief grace period to observe EOF
                // once the killed child's pipes close, then snapshot
                // whatever they've accumulated so far either way.
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
}

/// Read `reader` to EOF in chunks, appending each chunk to `buf` as it
/// arrives so a concurrent reader of `buf` sees partial progress rather
/// than only a final, all-or-nothing write. Shared with the sandbox
/// back-end, which has the same partial-output-on-timeout requirement.
pub(crate) async fn drain_into(
    mut reader: impl tokio::io::AsyncRead + Unpin,
    buf: std::sync::Arc<tokio::sync::Mutex<Vec<u8>>>,
) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.lock().await.extend_from_slice(&chunk[..n]),
        }
    }
}
