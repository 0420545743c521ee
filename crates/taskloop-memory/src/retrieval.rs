// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tagged-experience retrieval stub. No embedding model is wired up here
//! — this is a keyword-overlap approximation good enough to rank a small
//! in-process store, matching the spec's "may" (optional) framing.

#[derive(Debug, Clone)]
pub struct Experience {
    pub tag: String,
    pub text: String,
}

#[derive(Default)]
pub struct ExperienceStore {
    experiences: Vec<Experience>,
}

impl ExperienceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tag: impl Into<String>, text: impl Into<String>) {
        self.experiences.push(Experience { tag: tag.into(), text: text.into() });
    }

    /// Rank stored experiences by word-overlap with `query`, descending, and
    /// return the top `limit`. Ties keep insertion order.
    pub fn retrieve(&self, query: &str, limit: usize) -> Vec<&Experience> {
        let query_words: std::collections::HashSet<&str> = query.split_whitespace().collect();
        let mut scored: Vec<(usize, &Experience)> = self
            .experiences
            .iter()
            .map(|exp| {
                let score = exp.text.split_whitespace().filter(|w| query_words.contains(w)).count();
                (score, exp)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, exp)| exp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_retrieves_nothing() {
        let store = ExperienceStore::new();
        assert!(store.retrieve("anything", 5).is_empty());
    }

    #[test]
    fn retrieves_best_matching_experience_first() {
        let mut store = ExperienceStore::new();
        store.record("a", "fixed a flaky test in the parser module");
        store.record("b", "deployed a new release to production");
        let results = store.retrieve("flaky parser test", 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tag, "a");
    }

    #[test]
    fn limit_caps_number_of_results() {
        let mut store = ExperienceStore::new();
        store.record("a", "parser bug fix");
        store.record("b", "parser refactor");
        store.record("c", "parser test");
        let results = store.retrieve("parser", 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn unrelated_query_returns_nothing() {
        let mut store = ExperienceStore::new();
        store.record("a", "fixed a flaky test in the parser module");
        assert!(store.retrieve("completely unrelated words here", 5).is_empty());
    }
}
