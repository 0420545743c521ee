// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Non-terminating and terminating error types for the model layer
//!.

use thiserror::Error;

use crate::message::Message;

/// A recoverable parse failure: the assistant turn did not contain exactly
/// one well-formed action. Re-injected to the LM as the next user turn.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct FormatError(pub String);

impl FormatError {
    /// Build the user-role message this error is converted into.
    pub fn into_message(self) -> Message {
        use crate::message::{MessageExtra, Role};
        Message {
            role: Role::User,
            content: self.0,
            extra: MessageExtra::FormatError {
                message: String::new(),
                timestamp: crate::now_timestamp(),
            },
        }
    }
}

/// Classification of a model transport error, used by the retry driver to
/// decide whether an attempt is retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient transport/5xx/rate-limit error; retry with backoff.
    Retryable,
    /// Unsupported params, not-found, permission denied, context-window
    /// exceeded, authentication, or user cancel; abort immediately.
    Abort,
}

/// Errors surfaced by a [`crate::provider::ModelProvider`] implementation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported parameters: {0}")]
    UnsupportedParams(String),
    #[error("context window exceeded: {0}")]
    ContextWindowExceeded(String),
    #[error("user cancelled")]
    UserCancel,
    #[error("transient transport error: {0}")]
    Transient(String),
    #[error("cost calculation failed: {0}")]
    CostCalculation(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ModelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ModelError::Authentication(_)
            | ModelError::PermissionDenied(_)
            | ModelError::NotFound(_)
            | ModelError::UnsupportedParams(_)
            | ModelError::ContextWindowExceeded(_)
            | ModelError::UserCancel => ErrorClass::Abort,
            ModelError::Transient(_) | ModelError::CostCalculation(_) | ModelError::Other(_) => {
                ErrorClass::Retryable
            }
        }
    }
}
