// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The LM client layer: retry, cost accounting, streaming
//! guard, cache-control markers, and the two action-extraction dialects.

pub mod cache_control;
pub mod dialect;
pub mod error;
pub mod http_backend;
pub mod message;
pub mod mock;
pub mod provider;
pub mod retry;
pub mod stats;
pub mod streaming_guard;

pub use error::{ErrorClass, FormatError, ModelError};
pub use message::{Action, Message, MessageExtra, Role};
pub use provider::{CompletionBackend, CompletionResponse, CostCalculator, Model, QueryError, Usage};
pub use stats::GlobalModelStats;

/// Current time as an RFC 3339 string, used for `extra.timestamp` fields.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
