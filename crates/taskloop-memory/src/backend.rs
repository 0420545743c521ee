// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The summarization seam, kept abstract the same way
//! `CompletionBackend` is kept abstract in `taskloop-model` — producing a
//! summary means an extra LM call, an external collaborator this crate does
//! not own.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary backend call failed: {0}")]
    Backend(String),
}

/// Turns a block of conversation text into a shorter summary.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError>;
}

#[cfg(test)]
pub(crate) struct ScriptedSummaryBackend {
    pub reply: String,
    pub fail: bool,
}

#[cfg(test)]
#[async_trait]
impl SummaryBackend for ScriptedSummaryBackend {
    async fn summarize(&self, _text: &str) -> Result<String, SummaryError> {
        if self.fail {
            Err(SummaryError::Backend("scripted failure".to_string()))
        } else {
            Ok(self.reply.clone())
        }
    }
}
