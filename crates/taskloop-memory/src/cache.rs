// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Summary cache keyed by a hash of the source message range.

use std::num::NonZeroUsize;

use lru::LruCache;
use sha2::{Digest, Sha256};

/// sha2 hash of the concatenated source text, used as the cache key so an
/// unchanged middle region never pays for a repeat summarization call.
pub fn range_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct SummaryCache {
    inner: LruCache<String, String>,
}

impl SummaryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { inner: LruCache::new(capacity) }
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn insert(&mut self, key: String, summary: String) {
        self.inner.put(key, summary);
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_produces_same_key() {
        assert_eq!(range_key("abc"), range_key("abc"));
    }

    #[test]
    fn different_text_produces_different_key() {
        assert_ne!(range_key("abc"), range_key("abd"));
    }

    #[test]
    fn cache_hits_after_insert() {
        let mut cache = SummaryCache::new(4);
        let key = range_key("hello world");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), "summary".to_string());
        assert_eq!(cache.get(&key), Some("summary".to_string()));
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache = SummaryCache::new(1);
        cache.insert("a".to_string(), "sa".to_string());
        cache.insert("b".to_string(), "sb".to_string());
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some("sb".to_string()));
    }
}
