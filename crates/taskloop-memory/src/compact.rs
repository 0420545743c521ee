// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Middle-region summarization: compress everything between the system
//! message and the last `keep_last_k` messages into a single "previous
//! conversation summary" user message. One summarization contract only —
//! no rolling Normal/Emergency/No-op strategy selection or budget-driven
//! compaction gate.

use taskloop_config::MemoryConfig;
use taskloop_model::{Message, Role};

use crate::backend::SummaryBackend;
use crate::cache::{range_key, SummaryCache};

#[derive(Debug, PartialEq, Eq)]
pub enum CompactOutcome {
    /// The middle region was replaced by a single summary message.
    Compacted { messages_replaced: usize },
    /// Nothing to do: the log already fits within `keep_last_k`.
    NotNeeded,
    /// The summarizer failed; the log was left untouched.
    Skipped { reason: String },
}

fn serialize_range(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
                Role::Exit => "Exit",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Attempt to compact `messages` in place. Never terminates the run: any
/// backend failure is reported as `Skipped` and the history is left as-is,
/// per spec §4.H "Failure of memory components MUST degrade gracefully".
pub async fn maybe_compact(
    messages: &mut Vec<Message>,
    config: &MemoryConfig,
    backend: &dyn SummaryBackend,
    cache: &mut SummaryCache,
) -> CompactOutcome {
    if !config.enabled {
        return CompactOutcome::NotNeeded;
    }

    let system_offset = if messages.first().map(|m| m.role) == Some(Role::System) { 1 } else { 0 };
    let total = messages.len();
    if total <= system_offset {
        return CompactOutcome::NotNeeded;
    }
    let non_system = total - system_offset;
    if non_system <= config.keep_last_k {
        return CompactOutcome::NotNeeded;
    }
    let middle_end = total - config.keep_last_k;
    if middle_end <= system_offset {
        return CompactOutcome::NotNeeded;
    }

    let middle = &messages[system_offset..middle_end];
    let source_text = serialize_range(middle);
    let key = range_key(&source_text);

    let summary = if let Some(cached) = cache.get(&key) {
        cached
    } else {
        match backend.summarize(&source_text).await {
            Ok(summary) => {
                cache.insert(key, summary.clone());
                summary
            }
            Err(e) => {
                tracing::warn!(error = %e, "memory summarization failed, keeping full history");
                return CompactOutcome::Skipped { reason: e.to_string() };
            }
        }
    };

    let replaced = middle_end - system_offset;
    let summary_message = Message::user(format!("Previous conversation summary:\n\n{summary}"));
    messages.splice(system_offset..middle_end, std::iter::once(summary_message));

    CompactOutcome::Compacted { messages_replaced: replaced }
}
