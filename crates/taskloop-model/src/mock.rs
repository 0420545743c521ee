// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Deterministic mock backends for tests: a pre-scripted backend that pops
//! the next response off a queue, plus recording of the last request seen
//! so tests can assert on what was sent.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ModelError;
use crate::provider::{CompletionBackend, CompletionResponse};

/// Pops a pre-scripted [`CompletionResponse`] off the front of a queue for
/// each call to `complete`. Panics if the queue is exhausted — tests should
/// script exactly as many responses as LM turns they expect.
pub struct ScriptedBackend {
    responses: Mutex<Vec<CompletionResponse>>,
    pub last_messages: Mutex<Option<Vec<Value>>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self { responses: Mutex::new(responses), last_messages: Mutex::new(None) }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, messages: &[Value], _tools: &[Value]) -> Result<CompletionResponse, ModelError> {
        *self.last_messages.lock().expect("lock poisoned") = Some(messages.to_vec());
        let mut queue = self.responses.lock().expect("lock poisoned");
        if queue.is_empty() {
            return Err(ModelError::Transient("scripted backend exhausted".into()));
        }
        Ok(queue.remove(0))
    }
}

/// A backend whose first N calls fail transiently before succeeding, for
/// exercising the retry driver end-to-end.
pub struct FlakyBackend {
    fail_times: Mutex<u32>,
    response: CompletionResponse,
}

impl FlakyBackend {
    pub fn new(fail_times: u32, response: CompletionResponse) -> Self {
        Self { fail_times: Mutex::new(fail_times), response }
    }
}

#[async_trait]
impl CompletionBackend for FlakyBackend {
    async fn complete(&self, _messages: &[Value], _tools: &[Value]) -> Result<CompletionResponse, ModelError> {
        let mut remaining = self.fail_times.lock().expect("lock poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ModelError::Transient("simulated transient failure".into()));
        }
        Ok(self.response.clone())
    }
}
