// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Process-wide cost/call accumulator (`GlobalModelStats`).
//!
//! A single process-scoped value protected by a lock. Plain
//! `std::sync::Mutex` rather than the async kind since updates here are a
//! plain arithmetic critical section with no `.await` inside it.

use std::sync::{Mutex, OnceLock};

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ModelStats {
    pub instance_cost: f64,
    pub api_calls: u64,
}

struct GlobalState {
    cost: f64,
    n_calls: u64,
}

fn global() -> &'static Mutex<GlobalState> {
    static STATE: OnceLock<Mutex<GlobalState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(GlobalState { cost: 0.0, n_calls: 0 }))
}

/// Process-wide accumulator of total cost and total call count. Thread-safe
/// for concurrent updates from multiple batch workers.
pub struct GlobalModelStats;

impl GlobalModelStats {
    /// Record one successful query with the given cost.
    pub fn add(cost: f64) {
        let mut g = global().lock().expect("global model stats lock poisoned");
        g.cost += cost;
        g.n_calls += 1;
    }

    pub fn total_cost() -> f64 {
        global().lock().expect("global model stats lock poisoned").cost
    }

    pub fn total_calls() -> u64 {
        global().lock().expect("global model stats lock poisoned").n_calls
    }

    /// Test-only: reset the global counters between cases.
    #[doc(hidden)]
    pub fn reset_for_tests() {
        let mut g = global().lock().expect("global model stats lock poisoned");
        g.cost = 0.0;
        g.n_calls = 0;
    }
}

/// Per-model running totals, returned in the trajectory's `info.model_stats`.
#[derive(Debug, Default)]
pub struct InstanceModelStats {
    inner: Mutex<ModelStats>,
}

impl InstanceModelStats {
    pub fn add(&self, cost: f64) {
        let mut s = self.inner.lock().expect("instance model stats lock poisoned");
        s.instance_cost += cost;
        s.api_calls += 1;
    }

    pub fn snapshot(&self) -> ModelStats {
        *self.inner.lock().expect("instance model stats lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_stats_accumulate_and_reset() {
        GlobalModelStats::reset_for_tests();
        GlobalModelStats::add(0.5);
        GlobalModelStats::add(0.25);
        assert_eq!(GlobalModelStats::total_cost(), 0.75);
        assert_eq!(GlobalModelStats::total_calls(), 2);
        GlobalModelStats::reset_for_tests();
        assert_eq!(GlobalModelStats::total_cost(), 0.0);
    }

    #[test]
    fn instance_stats_independent_of_global() {
        let inst = InstanceModelStats::default();
        inst.add(1.0);
        inst.add(2.0);
        let snap = inst.snapshot();
        assert_eq!(snap.instance_cost, 3.0);
        assert_eq!(snap.api_calls, 2);
    }
}
