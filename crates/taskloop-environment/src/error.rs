// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Raised (as the `Submitted` variant of [`crate::ExecOutcome`]) when the
/// submission sentinel is detected, per spec §4.B / §6. Carries the
/// remainder of the output as the submission payload.
#[derive(Debug, Clone, Error)]
#[error("submitted")]
pub struct Submitted(pub String);

/// Failures that are not part of the recoverable timeout path: spawn
/// failures, template rendering errors, or a misconfigured backend. These
/// propagate as terminal-with-traceback per spec §7.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to spawn command: {0}")]
    Spawn(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("container backend error: {0}")]
    Backend(String),
}
