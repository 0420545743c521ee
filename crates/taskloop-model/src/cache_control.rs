// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Cache-control marker.
//!
//! Tags the last message's content segment with an ephemeral cache marker
//! for providers that support prompt caching. The marker affects only the
//! on-wire payload built for the provider request, never the stored
//! trajectory log.

use serde_json::{json, Value};

use taskloop_config::CacheControl;

/// Apply the configured cache-control marker to a wire-format message list
/// (as already produced by a provider's request-body builder). `messages`
/// is consumed and returned with the marker applied, if any.
///
/// In `default_end` mode the last message's `content` is rewritten from a
/// plain string into a one-element content-block array carrying
/// `cache_control: {"type": "ephemeral"}`, the Anthropic-style marker shape.
pub fn apply(mode: CacheControl, mut messages: Vec<Value>) -> Vec<Value> {
    if mode != CacheControl::DefaultEnd {
        return messages;
    }
    if let Some(last) = messages.last_mut() {
        if let Some(text) = last.get("content").and_then(|c| c.as_str()).map(str::to_string) {
            last["content"] = json!([{
                "type": "text",
                "text": text,
                "cache_control": { "type": "ephemeral" },
            }]);
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_mode_leaves_messages_untouched() {
        let messages = vec![json!({"role": "user", "content": "hi"})];
        let out = apply(CacheControl::None, messages.clone());
        assert_eq!(out, messages);
    }

    #[test]
    fn default_end_tags_only_last_message() {
        let messages = vec![
            json!({"role": "system", "content": "sys"}),
            json!({"role": "user", "content": "hi"}),
        ];
        let out = apply(CacheControl::DefaultEnd, messages);
        assert_eq!(out[0]["content"], json!("sys"));
        assert_eq!(out[1]["content"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(out[1]["content"][0]["text"], "hi");
    }

    #[test]
    fn default_end_on_empty_list_is_noop() {
        let out = apply(CacheControl::DefaultEnd, vec![]);
        assert!(out.is_empty());
    }
}
