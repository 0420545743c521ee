// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Streaming guard.
//!
//! Reconstructs the assistant message from streamed text chunks while
//! watching a rolling tail window for a pathologically repeating
//! closing-tag pattern (`</…>`); if it repeats beyond a threshold within
//! the window, the response is truncated and a warning logged.

use regex::Regex;
use tracing::warn;

/// Default rolling-window size (characters) the guard inspects.
pub const DEFAULT_WINDOW: usize = 2000;
/// Default repeat threshold that triggers truncation.
pub const DEFAULT_THRESHOLD: usize = 30;

pub struct StreamingGuard {
    window: usize,
    threshold: usize,
    closing_tag_re: Regex,
    buffer: String,
    truncated: bool,
}

impl StreamingGuard {
    pub fn new(window: usize, threshold: usize) -> Self {
        Self {
            window,
            threshold,
            closing_tag_re: Regex::new(r"</[^>]{0,40}>").expect("valid regex"),
            buffer: String::new(),
            truncated: false,
        }
    }

    /// Feed one streamed text delta. Returns `false` once the guard has
    /// decided to truncate; callers should stop accumulating further chunks.
    pub fn push(&mut self, delta: &str) -> bool {
        if self.truncated {
            return false;
        }
        self.buffer.push_str(delta);
        let byte_offset = self.buffer.len().saturating_sub(self.window);
        // `byte_offset` is a raw byte count into a UTF-8 string; walk it
        // forward to the next char boundary before slicing so multibyte
        // output longer than `window` can't land us mid-character.
        let tail_start = (byte_offset..=self.buffer.len())
            .find(|&i| self.buffer.is_char_boundary(i))
            .unwrap_or(self.buffer.len());
        let tail = &self.buffer[tail_start..];
        let repeats = self.closing_tag_re.find_iter(tail).count();
        if repeats > self.threshold {
            warn!(
                repeats,
                window = self.window,
                "streaming guard: repeated closing-tag pattern detected, truncating response"
            );
            self.truncated = true;
            return false;
        }
        true
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

impl Default for StreamingGuard {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_THRESHOLD)
    }
}

/// Validate streamed usage accounting. Returns `false` (guard falls back to
/// non-streaming) if `total < prompt_tokens`, an internally inconsistent
/// report some providers emit mid-stream.
pub fn usage_is_valid(prompt_tokens: u32, total_tokens: u32) -> bool {
    total_tokens >= prompt_tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_plain_text() {
        let mut g = StreamingGuard::default();
        assert!(g.push("hello "));
        assert!(g.push("world"));
        assert_eq!(g.text(), "hello world");
        assert!(!g.was_truncated());
    }

    #[test]
    fn multibyte_tail_offset_does_not_panic_on_char_boundary() {
        // A narrow window whose byte offset would otherwise land inside one
        // of these 3-byte UTF-8 characters.
        let mut g = StreamingGuard::new(5, 30);
        for _ in 0..20 {
            assert!(g.push("日本語テキスト"));
        }
        assert!(!g.was_truncated());
    }

    #[test]
    fn truncates_on_pathological_repetition() {
        let mut g = StreamingGuard::new(2000, 5);
        let mut ok = true;
        for _ in 0..10 {
            ok = g.push("</a></a></a>");
        }
        assert!(!ok);
        assert!(g.was_truncated());
    }

    #[test]
    fn push_after_truncation_is_noop() {
        let mut g = StreamingGuard::new(50, 2);
        for _ in 0..5 {
            g.push("</x></x>");
        }
        assert!(g.was_truncated());
        let len_before = g.text().len();
        assert!(!g.push("more text"));
        assert_eq!(g.text().len(), len_before);
    }

    #[test]
    fn usage_validity_check() {
        assert!(usage_is_valid(100, 150));
        assert!(!usage_is_valid(100, 50));
        assert!(usage_is_valid(0, 0));
    }
}
