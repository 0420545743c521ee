// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The human-input seam for the interactive variant. A trait
//! rather than a hard dependency on stdin so the confirm/human/yolo loop can
//! be driven deterministically in tests, the way `ScriptedBackend`
//! (`taskloop-model`) stands in for a real LM provider.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Reads one line of human input in response to a prompt. `None` means EOF
/// (stdin closed, e.g. running under a non-interactive harness).
#[async_trait]
pub trait Prompter: Send {
    async fn prompt_line(&mut self, prompt: &str) -> Option<String>;
}

/// Reads from real stdin, echoing `prompt` to stdout first.
pub struct StdPrompter {
    reader: BufReader<tokio::io::Stdin>,
}

impl StdPrompter {
    pub fn new() -> Self {
        Self { reader: BufReader::new(tokio::io::stdin()) }
    }
}

impl Default for StdPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for StdPrompter {
    async fn prompt_line(&mut self, prompt: &str) -> Option<String> {
        use std::io::Write as _;
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
            Err(_) => None,
        }
    }
}

/// A scripted sequence of responses, consumed in order. Used by tests and
/// can also back a `yolo`-like non-interactive invocation that pre-supplies
/// every answer up front.
#[derive(Default)]
pub struct ScriptedPrompter {
    responses: VecDeque<Option<String>>,
}

impl ScriptedPrompter {
    pub fn new(responses: Vec<&str>) -> Self {
        Self { responses: responses.into_iter().map(|s| Some(s.to_string())).collect() }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt_line(&mut self, _prompt: &str) -> Option<String> {
        self.responses.pop_front().flatten()
    }
}
