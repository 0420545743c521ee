// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::error::EnvError;
use crate::result::ExecutionResult;

/// What one `execute()` call produced: either a completed process result, or
/// a timeout with whatever partial output had already been captured (spec
/// §4.B: "preserves any partial output already captured").
#[derive(Debug)]
pub enum RawExecOutput {
    Completed(ExecutionResult),
    TimedOut { partial_output: String },
}

/// One concrete execution back-end (local process, container, sandbox).
/// Selected by `EnvironmentConfig.environment_class`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(
        &self,
        action: &str,
        cwd: Option<&str>,
        timeout: Option<u64>,
    ) -> Result<RawExecOutput, EnvError>;

    /// Release any resources held by this backend (container stop,
    /// temp dirs). Called on every exit path, including exceptional ones.
    /// The default implementation is a no-op (local backend holds nothing).
    async fn cleanup(&self) {}
}
